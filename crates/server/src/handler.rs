//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker and its cache store.
use std::sync::Arc;

use crate::tools::cache::{CacheListParams, CachePurgeParams, list_impl, purge_impl};
use crate::tools::fetch::{ShellFetchParams, fetch_impl};
use crate::tools::lifecycle::{ShellMessageParams, activate_impl, install_impl, message_impl};

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
use shellcache_client::Worker;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    worker: Arc<Worker>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler around a worker.
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Send a request through the offline cache worker. Reports status, body and whether it was served from cache, network, or the offline document."
    )]
    async fn shell_fetch(&self, params: Parameters<ShellFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Run the install step: populate the precache from the manifest, all-or-nothing.")]
    async fn shell_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate the waiting worker and delete caches from other versions.")]
    async fn shell_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    #[tool(description = "Post a message to the worker, e.g. {\"type\": \"SKIP_WAITING\"}.")]
    async fn shell_message(&self, params: Parameters<ShellMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "List cache names, or the keys of one cache oldest first.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(self.worker.store().as_ref(), params.0).await
    }

    #[tool(description = "Expire entries of one cache by count or age, or delete the cache.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.worker.store().as_ref(), params.0).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fixtures::{config, network, worker};
    use shellcache_core::MemoryStore;

    #[test]
    fn test_tool_router_lists_every_tool() {
        let store = Arc::new(MemoryStore::new());
        let network = network();
        let server = ShellCacheServer::new(Arc::new(worker(&config("v1"), &store, &network)));

        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec!["cache_list", "cache_purge", "shell_activate", "shell_fetch", "shell_install", "shell_message"]
        );
    }

    #[test]
    fn test_server_info() {
        let store = Arc::new(MemoryStore::new());
        let network = network();
        let server = ShellCacheServer::new(Arc::new(worker(&config("v1"), &store, &network)));

        assert_eq!(server.get_info().server_info.name, "shellcache");
    }
}
