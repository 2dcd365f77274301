//! Generation bookkeeping: open, enumerate, destroy.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::store::Store;
use crate::Error;

/// Version tag naming one logical snapshot of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    /// Create a generation id.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the tag is empty or contains whitespace.
    pub fn new(tag: impl Into<String>) -> Result<Self, Error> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(Error::InvalidInput("generation id must not be empty".into()));
        }
        if tag.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!("generation id must not contain whitespace: {tag:?}")));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Summary of a stored generation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub created_at: String,
    pub ready: bool,
    pub ready_at: Option<String>,
    pub entries: u64,
}

impl CacheDb {
    /// Return a handle to the named generation, creating it if absent.
    ///
    /// Opening an existing generation leaves its entries and readiness intact.
    pub async fn open_store(&self, generation: &GenerationId) -> Result<Store, Error> {
        let name = generation.as_str().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let created = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let changed = conn.execute(
                    "INSERT INTO generations (name, created_at, ready) VALUES (?1, ?2, 0)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                Ok(changed)
            })
            .await
            .map_err(Error::from)?;

        if created > 0 {
            tracing::info!(generation = %generation, "created cache generation");
        }

        Ok(self.store(generation))
    }

    /// Return a handle to the named generation without creating it.
    ///
    /// Lookups against a generation that does not exist find nothing.
    pub fn store(&self, generation: &GenerationId) -> Store {
        Store::new(self.clone(), generation.clone())
    }

    /// Names of every stored generation, oldest first.
    pub async fn generations(&self) -> Result<Vec<GenerationId>, Error> {
        let names = self
            .conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut names = Vec::new();
                for row in rows {
                    names.push(row?);
                }
                Ok(names)
            })
            .await
            .map_err(Error::from)?;

        Ok(names.into_iter().map(GenerationId).collect())
    }

    /// Every stored generation with its readiness and entry count.
    pub async fn generation_info(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.created_at, g.ready, g.ready_at,
                            (SELECT COUNT(*) FROM entries e WHERE e.generation = g.name)
                     FROM generations g
                     ORDER BY g.created_at ASC, g.name ASC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(GenerationInfo {
                        name: row.get(0)?,
                        created_at: row.get(1)?,
                        ready: row.get::<_, i32>(2)? == 1,
                        ready_at: row.get(3)?,
                        entries: row.get::<_, i64>(4)? as u64,
                    })
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a generation and all of its entries.
    ///
    /// Returns false if the generation did not exist.
    pub async fn destroy_generation(&self, generation: &GenerationId) -> Result<bool, Error> {
        let name = generation.as_str().to_string();
        let deleted = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                Ok(conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?)
            })
            .await
            .map_err(Error::from)?;

        if deleted > 0 {
            tracing::info!(generation = %generation, "destroyed cache generation");
        }
        Ok(deleted > 0)
    }
}
