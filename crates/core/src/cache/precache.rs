//! Manifest population.

use futures_util::future::try_join_all;

use super::store::Store;
use crate::network::Network;
use crate::{Error, RequestIdentity};

impl Store {
    /// Fetch every request and store the responses.
    ///
    /// All requests are fetched before anything is written, and the writes
    /// share one transaction, so a failure leaves the generation exactly as it
    /// was. Non-2xx responses count as failures.
    ///
    /// Returns the number of entries written.
    pub async fn populate<N>(&self, network: &N, requests: &[RequestIdentity]) -> Result<usize, Error>
    where
        N: Network + ?Sized,
    {
        let captures = try_join_all(requests.iter().map(|request| async move {
            let response = network
                .fetch(request)
                .await
                .map_err(|e| Error::PrecacheFailed(format!("{request}: {e}")))?;
            if !response.is_ok() {
                return Err(Error::PrecacheFailed(format!("{request}: status {}", response.status)));
            }
            Ok::<_, Error>((request.clone(), response))
        }))
        .await?;

        self.put_all(&captures).await?;

        tracing::debug!(generation = %self.generation(), entries = captures.len(), "populated generation");
        Ok(captures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDb, GenerationId, MatchOptions};
    use crate::identity::parse_scope;
    use crate::network::StaticNetwork;
    use crate::{CapturedResponse, PrecacheManifest};

    fn requests(locators: &[&str]) -> Vec<RequestIdentity> {
        let scope = parse_scope("http://localhost:8080/").unwrap();
        PrecacheManifest::new(locators.iter().copied()).resolve(&scope).unwrap()
    }

    #[tokio::test]
    async fn test_populate_stores_every_request() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store(&GenerationId::new("v1").unwrap()).await.unwrap();
        let network = StaticNetwork::new()
            .with_route("http://localhost:8080/", "text/html", "root")
            .with_route("http://localhost:8080/index.html", "text/html", "index");
        let reqs = requests(&["/", "/index.html"]);

        let written = store.populate(&network, &reqs).await.unwrap();
        assert_eq!(written, 2);
        for req in &reqs {
            assert!(store.lookup(req, MatchOptions::default()).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_populate_twice_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store(&GenerationId::new("v1").unwrap()).await.unwrap();
        let network = StaticNetwork::new()
            .with_route("http://localhost:8080/", "text/html", "root")
            .with_route("http://localhost:8080/index.html", "text/html", "index");
        let reqs = requests(&["/", "/index.html"]);

        store.populate(&network, &reqs).await.unwrap();
        let first = store.keys().await.unwrap();
        store.populate(&network, &reqs).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_populate_is_all_or_nothing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store(&GenerationId::new("v1").unwrap()).await.unwrap();
        let network = StaticNetwork::new().with_route("http://localhost:8080/", "text/html", "root");
        let reqs = requests(&["/", "/missing.css"]);

        let result = store.populate(&network, &reqs).await;
        assert!(matches!(result, Err(Error::PrecacheFailed(_))));
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_populate_rejects_error_status() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store(&GenerationId::new("v1").unwrap()).await.unwrap();
        let mut not_found = CapturedResponse::ok("http://localhost:8080/gone.png", "text/plain", "nope");
        not_found.status = 404;
        not_found.status_text = "Not Found".into();
        let network = StaticNetwork::new().with_response("http://localhost:8080/gone.png", not_found);

        let result = store.populate(&network, &requests(&["/gone.png"])).await;
        assert!(matches!(result, Err(Error::PrecacheFailed(msg)) if msg.contains("404")));
    }
}
