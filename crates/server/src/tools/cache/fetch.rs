//! cache_fetch tool implementation.
//!
//! Delivers a fetch interception and reports how it was answered.

use offcache_core::{CacheWorker, Error, FetchOutcome, Network};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Request locator, absolute or relative to the worker scope.
    pub url: String,
}

/// How the interception resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Cache,
    Network,
    NoResponse,
}

/// Output from the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchOutput {
    pub source: FetchSource,
    /// URL of the served response.
    pub url: Option<String>,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    /// When the served entry was written (cache hits only).
    pub stored_at: Option<String>,
    /// Body length in bytes.
    pub size: Option<usize>,
    /// Body decoded as UTF-8, lossily.
    pub body: Option<String>,
}

impl From<FetchOutcome> for CacheFetchOutput {
    fn from(outcome: FetchOutcome) -> Self {
        let (source, response, stored_at) = match outcome {
            FetchOutcome::Cached(entry) => (FetchSource::Cache, Some(entry.response), Some(entry.stored_at)),
            FetchOutcome::Filled(response) => (FetchSource::Network, Some(response), None),
            FetchOutcome::NoResponse => (FetchSource::NoResponse, None, None),
        };

        Self {
            source,
            url: response.as_ref().map(|r| r.url.clone()),
            status: response.as_ref().map(|r| r.status),
            content_type: response.as_ref().and_then(|r| r.content_type.clone()),
            stored_at,
            size: response.as_ref().map(|r| r.body.len()),
            body: response.map(|r| String::from_utf8_lossy(&r.body).into_owned()),
        }
    }
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl<N: Network>(
    worker: &CacheWorker<N>, params: CacheFetchParams,
) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }

    let outcome = worker.fetch(&params.url).await?;

    let output = CacheFetchOutput::from(outcome);
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
