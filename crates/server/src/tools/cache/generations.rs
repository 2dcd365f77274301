//! cache_generations tool implementation.
//!
//! Lists stored generations with their readiness and entry counts.

use offcache_core::{CacheWorker, Error, GenerationId, GenerationInfo, Network, WorkerState};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    /// The generation this worker serves from.
    pub current: GenerationId,
    pub state: WorkerState,
    pub generations: Vec<GenerationInfo>,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl<N: Network>(worker: &CacheWorker<N>) -> Result<CallToolResult, McpError> {
    let generations = worker.db().generation_info().await?;

    let output = CacheGenerationsOutput {
        current: worker.deployment().current.clone(),
        state: worker.state().await,
        generations,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
