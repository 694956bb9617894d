//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

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
use shellcache_core::{AppConfig, Registration};

use crate::tools::cache::{CacheGetParams, CacheListParams, get_impl, list_impl};
use crate::tools::worker_fetch::{WorkerFetchParams, fetch_impl};
use crate::tools::worker_register::{WorkerRegisterParams, register_impl};
use crate::tools::worker_status::{WorkerStatusParams, status_impl};
use crate::tools::worker_sync::{WorkerSyncParams, sync_impl};

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
    config: Arc<AppConfig>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler around a registration and the loaded configuration.
    pub fn new(registration: Arc<Registration>, config: Arc<AppConfig>) -> Self {
        Self { tool_router: Self::tool_router(), registration, config }
    }

    #[tool(
        description = "Install a cache version (precache the app shell) and activate it, deleting every other bucket. Optional `version` overrides the configured one."
    )]
    async fn worker_register(&self, params: Parameters<WorkerRegisterParams>) -> Result<CallToolResult, McpError> {
        register_impl(&self.registration, &self.config, params.0).await
    }

    #[tool(
        description = "Send a request through the active worker. Returns status, headers, body, and whether it was served from cache or network and by which strategy."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, params.0).await
    }

    #[tool(description = "Deliver the connectivity-restored sync trigger to the active worker.")]
    async fn worker_sync(&self, params: Parameters<WorkerSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.registration, &self.config, params.0).await
    }

    #[tool(description = "Report the active and waiting workers and the buckets in storage.")]
    async fn worker_status(&self, _params: Parameters<WorkerStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    #[tool(description = "List cache buckets and the request keys stored in each.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.registration, params.0).await
    }

    #[tool(description = "Read one stored response by URL (and method). Defaults to the active bucket.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.registration, &self.config, params.0).await
    }
}

impl ServerHandler for ShellCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline-caching agent for a single-page app. Register a version, then route requests with worker_fetch."
                    .into(),
            ),
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
