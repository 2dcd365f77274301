//! Network seam.
//!
//! The worker never talks HTTP directly; it asks a [`Network`] for a captured
//! response. `offcache-client` provides the reqwest implementation.

use crate::{CapturedResponse, Error, RequestIdentity};

/// Something that can resolve a request to a response.
///
/// Implementations return non-2xx responses as values; only transport-level
/// failures are errors.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &RequestIdentity) -> Result<CapturedResponse, Error>;
}

#[cfg(any(test, feature = "testing"))]
pub use self::testing::StaticNetwork;

#[cfg(any(test, feature = "testing"))]
mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use super::Network;
    use crate::{CapturedResponse, Error, RequestIdentity};

    /// In-memory network serving a fixed route table.
    ///
    /// Routes are keyed by full URL. Unknown URLs fail as if unreachable.
    #[derive(Debug, Default)]
    pub struct StaticNetwork {
        routes: HashMap<String, CapturedResponse>,
        calls: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
    }

    impl StaticNetwork {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_route(self, url: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
            self.with_response(url, CapturedResponse::ok(url, content_type, body))
        }

        pub fn with_response(mut self, url: &str, response: CapturedResponse) -> Self {
            self.routes.insert(url.to_string(), response);
            self
        }

        /// Total number of fetches attempted.
        pub fn calls(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }

        /// Number of fetches attempted for one URL.
        pub fn calls_for(&self, url: &str) -> usize {
            self.calls
                .lock()
                .map(|calls| calls.get(url).copied().unwrap_or(0))
                .unwrap_or(0)
        }
    }

    #[async_trait::async_trait]
    impl Network for StaticNetwork {
        async fn fetch(&self, request: &RequestIdentity) -> Result<CapturedResponse, Error> {
            self.total.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut calls) = self.calls.lock() {
                *calls.entry(request.as_str().to_string()).or_default() += 1;
            }

            self.routes
                .get(request.as_str())
                .cloned()
                .ok_or_else(|| Error::HttpError(format!("network error: no route to {request}")))
        }
    }
}
