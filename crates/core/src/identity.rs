//! Request identity: the key a live request is matched against.
//!
//! Locators are resolved against the worker scope, so `./index.html`,
//! `index.html` and `/index.html` under `http://localhost:8080/` all name the
//! same entry. Fragments never participate in matching; the query string does
//! unless the lookup asks to ignore it.

use std::fmt;

use url::Url;

use crate::Error;

/// Parse and check a scope URL.
///
/// Only `http` and `https` scopes can host a cache worker.
pub fn parse_scope(input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty scope".into()));
    }

    let scope = Url::parse(trimmed).map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;
    match scope.scheme() {
        "http" | "https" => Ok(scope),
        scheme => Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
    }
}

/// Canonical identity of an intercepted or precached request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    url: Url,
}

impl RequestIdentity {
    /// Resolve a locator against `scope`.
    ///
    /// Absolute locators are accepted as-is; relative ones are joined onto the
    /// scope. The fragment is dropped and the query string kept verbatim.
    pub fn resolve(scope: &Url, locator: &str) -> Result<Self, Error> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidUrl("empty locator".into()));
        }

        let mut url = scope
            .join(trimmed)
            .map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
        }

        url.set_fragment(None);

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The identity with its query string removed, used for
    /// query-insensitive matching.
    pub fn without_search(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.into()
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
