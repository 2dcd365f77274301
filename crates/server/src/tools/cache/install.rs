//! cache_install tool implementation.
//!
//! Delivers the install event: opens the current generation and precaches
//! the manifest.

use offcache_core::{CacheWorker, Error, GenerationId, Network, WorkerState};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the cache_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheInstallOutput {
    /// The generation that was populated.
    pub generation: GenerationId,
    /// Number of manifest entries captured.
    pub entries: usize,
    /// Worker state after the event.
    pub state: WorkerState,
}

/// Implementation of the cache_install tool.
pub async fn install_impl<N: Network>(worker: &CacheWorker<N>) -> Result<CallToolResult, McpError> {
    let report = worker.install().await?;

    let output = CacheInstallOutput { generation: report.generation, entries: report.entries, state: worker.state().await };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
