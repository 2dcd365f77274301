//! cache_activate tool implementation.
//!
//! Delivers the activate event; with stale purging enabled, every generation
//! other than the current one is destroyed.

use offcache_core::{ActivationReport, CacheWorker, Error, Network, WorkerState};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the cache_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheActivateOutput {
    /// What the stale sweep did.
    pub report: ActivationReport,
    /// Worker state after the event.
    pub state: WorkerState,
}

/// Implementation of the cache_activate tool.
pub async fn activate_impl<N: Network>(worker: &CacheWorker<N>) -> Result<CallToolResult, McpError> {
    let report = worker.activate().await?;

    let output = CacheActivateOutput { report, state: worker.state().await };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
