//! Cache worker: lifecycle events driven through the interception policy.
//!
//! A worker moves through `parsed → installing → installed → activating →
//! activated`. A failed install leaves it `redundant`; the host may deliver
//! install again. Fetch interceptions are answered once activation has begun.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::cache::{CacheDb, CacheEntry, CapturedResponse, GenerationId, Store};
use crate::deployment::Deployment;
use crate::network::Network;
use crate::{Error, RequestIdentity};

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    pub generation: GenerationId,
    pub entries: usize,
}

/// A stale generation that could not be destroyed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DestroyFailure {
    pub generation: GenerationId,
    pub error: String,
}

/// Result of activation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivationReport {
    pub current: GenerationId,
    pub destroyed: Vec<GenerationId>,
    pub failed: Vec<DestroyFailure>,
}

/// How a fetch interception was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from the current generation.
    Cached(CacheEntry),
    /// Fetched from the network and written through.
    Filled(CapturedResponse),
    /// Nothing to serve; the host lets the request fail uncached.
    NoResponse,
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&CapturedResponse> {
        match self {
            Self::Cached(entry) => Some(&entry.response),
            Self::Filled(response) => Some(response),
            Self::NoResponse => None,
        }
    }

    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse)
    }
}

/// Cache worker bound to one deployment.
pub struct CacheWorker<N> {
    db: CacheDb,
    network: N,
    deployment: Deployment,
    state: RwLock<WorkerState>,
}

impl<N: Network> CacheWorker<N> {
    pub fn new(db: CacheDb, network: N, deployment: Deployment) -> Self {
        Self { db, network, deployment, state: RwLock::new(WorkerState::Parsed) }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Handle to the current generation.
    pub fn current_store(&self) -> Store {
        self.db.store(&self.deployment.current)
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Handle the install event: open the current generation and precache
    /// the manifest.
    ///
    /// The generation only becomes eligible to serve once this resolves `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `Error::PrecacheFailed` if any manifest request cannot be
    /// captured; the worker becomes redundant and the store is unchanged.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(
            "install",
            &[WorkerState::Parsed, WorkerState::Installed, WorkerState::Redundant],
            WorkerState::Installing,
        )
        .await?;

        let generation = &self.deployment.current;
        tracing::info!(generation = %generation, manifest = self.deployment.manifest.len(), "install started");

        match self.precache().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed).await;
                tracing::info!(generation = %generation, entries = report.entries, "install finished");
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::warn!(generation = %generation, error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<InstallReport, Error> {
        let requests = self.deployment.manifest.resolve(&self.deployment.scope)?;
        let store = self.db.open_store(&self.deployment.current).await?;
        let entries = store.populate(&self.network, &requests).await?;
        store.mark_ready().await?;
        Ok(InstallReport { generation: self.deployment.current.clone(), entries })
    }

    /// Handle the activate event.
    ///
    /// A freshly started worker may activate without installing when a prior
    /// run already completed install for the current generation.
    ///
    /// # Errors
    ///
    /// Returns `Error::GenerationNotReady` if the current generation was never
    /// installed, or `Error::InvalidState` while an install is pending or after
    /// one failed.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        if self.state().await == WorkerState::Parsed && !self.current_store().is_ready().await? {
            return Err(Error::GenerationNotReady(self.deployment.current.to_string()));
        }

        let previous = self
            .transition(
                "activate",
                &[WorkerState::Parsed, WorkerState::Installed, WorkerState::Activated],
                WorkerState::Activating,
            )
            .await?;

        let swept = if self.deployment.policy.purge_stale {
            self.purge_stale_generations().await
        } else {
            Ok(ActivationReport { current: self.deployment.current.clone(), destroyed: Vec::new(), failed: Vec::new() })
        };

        match swept {
            Ok(report) => {
                self.set_state(WorkerState::Activated).await;
                tracing::info!(
                    generation = %self.deployment.current,
                    destroyed = report.destroyed.len(),
                    failed = report.failed.len(),
                    "activated"
                );
                Ok(report)
            }
            Err(e) => {
                self.set_state(previous).await;
                Err(e)
            }
        }
    }

    /// Destroy every generation other than the current one.
    ///
    /// Each destruction is independent; a failure is recorded and the sweep
    /// continues.
    pub async fn purge_stale_generations(&self) -> Result<ActivationReport, Error> {
        let current = &self.deployment.current;
        let mut destroyed = Vec::new();
        let mut failed = Vec::new();

        for generation in self.db.generations().await? {
            if generation == *current {
                continue;
            }
            match self.db.destroy_generation(&generation).await {
                Ok(_) => destroyed.push(generation),
                Err(e) => {
                    tracing::warn!(generation = %generation, error = %e, "failed to destroy stale generation");
                    failed.push(DestroyFailure { generation, error: e.to_string() });
                }
            }
        }

        Ok(ActivationReport { current: current.clone(), destroyed, failed })
    }

    /// Handle a fetch interception for `locator`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotActive` unless the worker is activating or activated
    /// (the stale sweep may run alongside live interceptions), and
    /// propagates network errors from a fill attempt. A miss without fill is
    /// `Ok(FetchOutcome::NoResponse)`, not an error.
    pub async fn fetch(&self, locator: &str) -> Result<FetchOutcome, Error> {
        let state = self.state().await;
        if !matches!(state, WorkerState::Activating | WorkerState::Activated) {
            return Err(Error::NotActive(format!("worker is {state}")));
        }

        let request = RequestIdentity::resolve(&self.deployment.scope, locator)?;
        self.respond(&request).await
    }

    async fn respond(&self, request: &RequestIdentity) -> Result<FetchOutcome, Error> {
        let policy = self.deployment.policy;
        let store = self.current_store();

        if let Some(entry) = store.lookup(request, policy.match_options()).await? {
            tracing::debug!(url = %request, "cache hit");
            return Ok(FetchOutcome::Cached(entry));
        }

        if !policy.network_fill {
            tracing::debug!(url = %request, "cache miss, no response");
            return Ok(FetchOutcome::NoResponse);
        }

        let response = self.network.fetch(request).await?;
        store.put(request, &response).await?;
        tracing::debug!(url = %request, status = response.status, "cache miss, filled from network");
        Ok(FetchOutcome::Filled(response))
    }

    async fn transition(
        &self, event: &str, allowed: &[WorkerState], next: WorkerState,
    ) -> Result<WorkerState, Error> {
        let mut state = self.state.write().await;
        if !allowed.contains(&*state) {
            return Err(Error::InvalidState(format!("cannot {event} while {}", *state)));
        }
        let previous = *state;
        *state = next;
        Ok(previous)
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MatchOptions;
    use crate::identity::parse_scope;
    use crate::network::StaticNetwork;
    use crate::policy::{Policy, PolicyPreset};
    use crate::PrecacheManifest;

    const ROOT: &str = "http://localhost:8080/";
    const INDEX: &str = "http://localhost:8080/index.html";
    const MISSING: &str = "http://localhost:8080/missing.js";

    fn site() -> StaticNetwork {
        StaticNetwork::new()
            .with_route(ROOT, "text/html", "<html>root</html>")
            .with_route(INDEX, "text/html", "<html>index</html>")
            .with_route(MISSING, "text/javascript", "console.log(1)")
    }

    fn deployment(version: &str, policy: Policy) -> Deployment {
        Deployment::new(
            GenerationId::new(version).unwrap(),
            parse_scope(ROOT).unwrap(),
            PrecacheManifest::new(["/", "/index.html"]),
            policy,
        )
    }

    async fn activated(db: CacheDb, policy: Policy) -> CacheWorker<StaticNetwork> {
        let worker = CacheWorker::new(db, site(), deployment("v1", policy));
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        worker
    }

    fn identity(locator: &str) -> RequestIdentity {
        RequestIdentity::resolve(&parse_scope(ROOT).unwrap(), locator).unwrap()
    }

    #[tokio::test]
    async fn test_install_precaches_manifest() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = CacheWorker::new(db, site(), deployment("v1", PolicyPreset::V4.policy()));

        let report = worker.install().await.unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(worker.state().await, WorkerState::Installed);

        let store = worker.current_store();
        assert!(store.is_ready().await.unwrap());
        for locator in ["/", "/index.html"] {
            assert!(store.lookup(&identity(locator), MatchOptions::default()).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_fetch_requires_activation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = CacheWorker::new(db, site(), deployment("v1", PolicyPreset::V4.policy()));
        worker.install().await.unwrap();

        let result = worker.fetch("/index.html").await;
        assert!(matches!(result, Err(Error::NotActive(_))));
    }

    #[tokio::test]
    async fn test_v1_miss_is_no_response_without_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = activated(db, PolicyPreset::V1.policy()).await;
        let calls_after_install = worker.network.calls();

        let outcome = worker.fetch("/missing.js").await.unwrap();
        assert!(outcome.is_no_response());
        assert_eq!(worker.network.calls(), calls_after_install);

        let entry = worker
            .current_store()
            .lookup(&identity("/missing.js"), MatchOptions::default())
            .await
            .unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_v1_hit_is_exact() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = activated(db, PolicyPreset::V1.policy()).await;

        assert!(matches!(worker.fetch("/index.html").await.unwrap(), FetchOutcome::Cached(_)));
        assert!(worker.fetch("/index.html?v=2").await.unwrap().is_no_response());
    }

    #[tokio::test]
    async fn test_v2_miss_fills_once() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = activated(db, PolicyPreset::V2.policy()).await;

        let first = worker.fetch("/missing.js").await.unwrap();
        assert!(matches!(first, FetchOutcome::Filled(_)));
        assert_eq!(first.response().unwrap().body.as_ref(), b"console.log(1)");

        let second = worker.fetch("/missing.js").await.unwrap();
        assert!(matches!(second, FetchOutcome::Cached(_)));
        assert_eq!(worker.network.calls_for(MISSING), 1);

        let entry = worker
            .current_store()
            .lookup(&identity("/missing.js"), MatchOptions::default())
            .await
            .unwrap();
        assert!(entry.is_some());
    }

    #[tokio::test]
    async fn test_fill_network_failure_propagates() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = activated(db, PolicyPreset::V3.policy()).await;

        let result = worker.fetch("/offline.css").await;
        assert!(matches!(result, Err(Error::HttpError(_))));
        let entry = worker
            .current_store()
            .lookup(&identity("/offline.css"), MatchOptions::default())
            .await
            .unwrap();
        assert!(entry.is_none());
    }

    #[tokio::test]
    async fn test_v4_miss_never_fills() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = activated(db, PolicyPreset::V4.policy()).await;
        let store = worker.current_store();
        let options = worker.deployment().policy.match_options();

        assert!(store.lookup(&identity("/missing.js"), options).await.unwrap().is_none());
        assert!(worker.fetch("/missing.js").await.unwrap().is_no_response());
        assert!(store.lookup(&identity("/missing.js"), options).await.unwrap().is_none());
        assert_eq!(worker.network.calls_for(MISSING), 0);
    }

    #[tokio::test]
    async fn test_v4_ignores_cache_busting_query() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = activated(db, PolicyPreset::V4.policy()).await;

        match worker.fetch("/index.html?cb=123").await.unwrap() {
            FetchOutcome::Cached(entry) => assert_eq!(entry.url, INDEX),
            other => panic!("expected cache hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_activate_purges_stale_generations() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = db.open_store(&GenerationId::new("v0").unwrap()).await.unwrap();
        let stale = identity("/index.html");
        old.put(&stale, &CapturedResponse::ok(INDEX, "text/html", "old")).await.unwrap();

        let worker = CacheWorker::new(db.clone(), site(), deployment("v1", PolicyPreset::V4.policy()));
        worker.install().await.unwrap();
        assert_eq!(db.generations().await.unwrap().len(), 2);

        let report = worker.activate().await.unwrap();
        assert_eq!(report.destroyed, vec![GenerationId::new("v0").unwrap()]);
        assert!(report.failed.is_empty());
        assert_eq!(db.generations().await.unwrap(), vec![GenerationId::new("v1").unwrap()]);
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_purge_continues_past_failed_destroy() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["a", "b", "c"] {
            db.open_store(&GenerationId::new(name).unwrap()).await.unwrap();
        }
        db.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER keep_b BEFORE DELETE ON generations WHEN OLD.name = 'b'
                     BEGIN SELECT RAISE(ABORT, 'generation b is locked'); END;",
                )
            })
            .await
            .unwrap();

        let worker = CacheWorker::new(db.clone(), site(), deployment("v9", PolicyPreset::V4.policy()));
        worker.install().await.unwrap();
        let report = worker.activate().await.unwrap();

        let mut destroyed = report.destroyed.clone();
        destroyed.sort();
        assert_eq!(destroyed, vec![GenerationId::new("a").unwrap(), GenerationId::new("c").unwrap()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].generation, GenerationId::new("b").unwrap());

        let mut remaining = db.generations().await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec![GenerationId::new("b").unwrap(), GenerationId::new("v9").unwrap()]);
        assert!(worker.current_store().is_ready().await.unwrap());
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_fetch_served_while_sweep_runs() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store(&GenerationId::new("v0").unwrap()).await.unwrap();
        let worker = CacheWorker::new(db.clone(), site(), deployment("v1", PolicyPreset::V4.policy()));
        worker.install().await.unwrap();
        worker.set_state(WorkerState::Activating).await;

        let (swept, fetched) =
            tokio::join!(worker.purge_stale_generations(), worker.fetch("/index.html?cb=7"));
        let report = swept.unwrap();

        match fetched.unwrap() {
            FetchOutcome::Cached(entry) => assert_eq!(entry.url, INDEX),
            other => panic!("expected cache hit, got {other:?}"),
        }
        assert_eq!(report.destroyed, vec![GenerationId::new("v0").unwrap()]);
        assert!(!report.destroyed.contains(&GenerationId::new("v1").unwrap()));
        assert_eq!(db.generations().await.unwrap(), vec![GenerationId::new("v1").unwrap()]);
        assert_eq!(worker.state().await, WorkerState::Activating);
    }

    #[tokio::test]
    async fn test_activate_keeps_stale_without_purge() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store(&GenerationId::new("v0").unwrap()).await.unwrap();

        let worker = CacheWorker::new(db.clone(), site(), deployment("v1", PolicyPreset::V2.policy()));
        worker.install().await.unwrap();
        let report = worker.activate().await.unwrap();

        assert!(report.destroyed.is_empty());
        assert_eq!(db.generations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_install_leaves_previous_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let previous = activated(db.clone(), PolicyPreset::V4.policy()).await;

        let broken = Deployment::new(
            GenerationId::new("v2").unwrap(),
            parse_scope(ROOT).unwrap(),
            PrecacheManifest::new(["/", "/fonts/missing.woff2"]),
            PolicyPreset::V4.policy(),
        );
        let next = CacheWorker::new(db.clone(), site(), broken);

        let result = next.install().await;
        assert!(matches!(result, Err(Error::PrecacheFailed(_))));
        assert_eq!(next.state().await, WorkerState::Redundant);
        assert!(matches!(next.activate().await, Err(Error::InvalidState(_))));

        assert!(!next.current_store().is_ready().await.unwrap());
        assert!(matches!(previous.fetch("/index.html").await.unwrap(), FetchOutcome::Cached(_)));
    }

    #[tokio::test]
    async fn test_install_can_be_retried_after_failure() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = StaticNetwork::new().with_route(ROOT, "text/html", "root");
        let worker = CacheWorker::new(db, network, deployment("v1", PolicyPreset::V4.policy()));

        assert!(worker.install().await.is_err());
        assert!(matches!(worker.install().await, Err(Error::PrecacheFailed(_))));
        assert_eq!(worker.state().await, WorkerState::Redundant);
    }

    #[tokio::test]
    async fn test_activate_without_install() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = CacheWorker::new(db, site(), deployment("v1", PolicyPreset::V4.policy()));

        let result = worker.activate().await;
        assert!(matches!(result, Err(Error::GenerationNotReady(_))));
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_restarted_worker_activates_installed_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = CacheWorker::new(db.clone(), site(), deployment("v1", PolicyPreset::V4.policy()));
        first.install().await.unwrap();

        let restarted = CacheWorker::new(db, StaticNetwork::new(), deployment("v1", PolicyPreset::V4.policy()));
        restarted.activate().await.unwrap();
        assert!(matches!(restarted.fetch("/").await.unwrap(), FetchOutcome::Cached(_)));
        assert_eq!(restarted.network.calls(), 0);
    }

    #[tokio::test]
    async fn test_activate_is_repeatable() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = activated(db, PolicyPreset::V4.policy()).await;
        let report = worker.activate().await.unwrap();
        assert!(report.destroyed.is_empty());
        assert_eq!(worker.state().await, WorkerState::Activated);
    }
}
