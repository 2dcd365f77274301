//! Per-generation entry operations.
//!
//! A [`Store`] is a cheap handle naming one generation; it holds no rows
//! itself. Writes use upsert semantics so the last write for an identity wins.

use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::generations::GenerationId;
use super::hash::compute_entry_key;
use crate::{Error, RequestIdentity};

/// A response as captured from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    /// The URL the response was served for.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    /// Header name/value pairs in arrival order.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CapturedResponse {
    /// A `200 OK` response with the given content type and body.
    pub fn ok(url: impl Into<String>, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            status_text: "OK".into(),
            content_type: Some(content_type.to_string()),
            headers: vec![("content-type".into(), content_type.to_string())],
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A stored (request identity, response) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    /// Full identity the entry was stored under, query string included.
    pub url: String,
    pub response: CapturedResponse,
    pub stored_at: String,
}

/// Options controlling how a lookup matches stored identities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare identities with their query strings removed.
    pub ignore_search: bool,
}

/// Handle to one generation's entries.
#[derive(Debug, Clone)]
pub struct Store {
    db: CacheDb,
    generation: GenerationId,
}

struct EntryRow {
    key: String,
    url: String,
    url_without_search: String,
    status: u16,
    status_text: String,
    content_type: Option<String>,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn encode(request: &RequestIdentity, response: &CapturedResponse) -> Result<Self, Error> {
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;
        Ok(Self {
            key: compute_entry_key(request.as_str()),
            url: request.as_str().to_string(),
            url_without_search: request.without_search(),
            status: response.status,
            status_text: response.status_text.clone(),
            content_type: response.content_type.clone(),
            headers_json,
            body: response.body.to_vec(),
        })
    }

    fn insert(&self, conn: &rusqlite::Connection, generation: &str, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            "INSERT INTO entries (
                generation, key, url, url_without_search, status, status_text,
                content_type, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(generation, key) DO UPDATE SET
                url = excluded.url,
                url_without_search = excluded.url_without_search,
                status = excluded.status,
                status_text = excluded.status_text,
                content_type = excluded.content_type,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                generation,
                &self.key,
                &self.url,
                &self.url_without_search,
                self.status as i64,
                &self.status_text,
                &self.content_type,
                &self.headers_json,
                &self.body,
                stored_at,
            ],
        )?;
        Ok(())
    }
}

fn ensure_generation(conn: &rusqlite::Connection, generation: &str) -> Result<(), Error> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
        params![generation],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(Error::InvalidState(format!("generation {generation} is not open")))
    }
}

impl Store {
    pub(crate) fn new(db: CacheDb, generation: GenerationId) -> Self {
        Self { db, generation }
    }

    pub fn generation(&self) -> &GenerationId {
        &self.generation
    }

    /// Find the entry matching `request`.
    ///
    /// With `ignore_search`, the earliest stored entry whose identity equals
    /// the request once both query strings are removed is returned.
    pub async fn lookup(&self, request: &RequestIdentity, options: MatchOptions) -> Result<Option<CacheEntry>, Error> {
        let generation = self.generation.as_str().to_string();
        let (sql, needle) = if options.ignore_search {
            (
                "SELECT key, url, status, status_text, content_type, headers_json, body, stored_at
                 FROM entries WHERE generation = ?1 AND url_without_search = ?2
                 ORDER BY rowid ASC LIMIT 1",
                request.without_search(),
            )
        } else {
            (
                "SELECT key, url, status, status_text, content_type, headers_json, body, stored_at
                 FROM entries WHERE generation = ?1 AND key = ?2",
                compute_entry_key(request.as_str()),
            )
        };

        self.db
            .conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(sql)?;
                let result = stmt.query_row(params![generation, needle], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Vec<u8>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                });

                let (key, url, status, status_text, content_type, headers_json, body, stored_at) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers: Vec<(String, String)> =
                    serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?;
                let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("{url}: status {status}")))?;

                Ok(Some(CacheEntry {
                    key,
                    url: url.clone(),
                    response: CapturedResponse { url, status, status_text, content_type, headers, body: Bytes::from(body) },
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite the entry for `request`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if the generation has been destroyed or
    /// was never opened.
    pub async fn put(&self, request: &RequestIdentity, response: &CapturedResponse) -> Result<(), Error> {
        let row = EntryRow::encode(request, response)?;
        let generation = self.generation.as_str().to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                ensure_generation(conn, &generation)?;
                row.insert(conn, &generation, &stored_at)
            })
            .await
            .map_err(Error::from)
    }

    /// Write a batch of entries in one transaction; either all land or none.
    pub async fn put_all(&self, entries: &[(RequestIdentity, CapturedResponse)]) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::encode(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let generation = self.generation.as_str().to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_generation(&tx, &generation)?;
                for row in &rows {
                    row.insert(&tx, &generation, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Identities of every entry in this generation, in insertion order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let generation = self.generation.as_str().to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY rowid ASC")?;
                let rows = stmt.query_map(params![generation], |row| row.get::<_, String>(0))?;
                let mut urls = Vec::new();
                for row in rows {
                    urls.push(row?);
                }
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Mark this generation as fully populated.
    pub async fn mark_ready(&self) -> Result<(), Error> {
        let generation = self.generation.as_str().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let updated = conn.execute(
                    "UPDATE generations SET ready = 1, ready_at = ?2 WHERE name = ?1",
                    params![generation, now],
                )?;
                if updated == 0 {
                    return Err(Error::InvalidState(format!("generation {generation} is not open")));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Whether a previous install completed for this generation.
    pub async fn is_ready(&self) -> Result<bool, Error> {
        let generation = self.generation.as_str().to_string();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let ready: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1 AND ready = 1)",
                    params![generation],
                    |row| row.get(0),
                )?;
                Ok(ready)
            })
            .await
            .map_err(Error::from)
    }
}
