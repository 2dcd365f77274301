//! MCP server handler implementation.
//!
//! This module defines the main server handler that routes lifecycle tool
//! calls to the cache worker.
use std::sync::Arc;

use crate::tools::cache::{CacheFetchParams, activate_impl, fetch_impl, generations_impl, install_impl};

use offcache_client::FetchClient;
use offcache_core::CacheWorker;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for offcache.
#[derive(Clone)]
pub struct OffcacheServer {
    worker: Arc<CacheWorker<FetchClient>>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OffcacheServer {
    /// Create a new server handler around a worker.
    pub fn new(worker: Arc<CacheWorker<FetchClient>>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    /// Deliver the install event.
    #[tool(description = "Install the current cache generation by precaching every manifest entry. \
                          Fails without touching the store if any entry cannot be fetched.")]
    async fn cache_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(self.worker.as_ref()).await
    }

    /// Deliver the activate event.
    #[tool(description = "Activate the installed generation. Depending on policy, destroys every other \
                          stored generation.")]
    async fn cache_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(self.worker.as_ref()).await
    }

    /// Deliver a fetch interception.
    #[tool(description = "Resolve a request against the cache. Returns the cached response, a freshly \
                          fetched-and-stored response, or no_response.")]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(self.worker.as_ref(), params.0).await
    }

    /// List stored generations.
    #[tool(description = "List stored cache generations with readiness and entry counts.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(self.worker.as_ref()).await
    }
}

impl ServerHandler for OffcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "offcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
