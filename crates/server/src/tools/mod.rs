//! MCP tool implementations.
//!
//! This module contains all tools exposed by the shellcache server.

pub mod cache;
pub mod worker_fetch;
pub mod worker_register;
pub mod worker_status;
pub mod worker_sync;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ServerError;

/// Wrap a tool output as pretty-printed JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ServerError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Network doubles for tool tests.

    use async_trait::async_trait;
    use rmcp::model::CallToolResult;
    use shellcache_core::{Error, Network, Request, Response};

    /// Answers every request with `200 ok`.
    pub struct StaticNetwork;

    #[async_trait]
    impl Network for StaticNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            Ok(Response::new(request.url.as_str(), 200, "ok").with_header("content-type", "text/plain"))
        }
    }

    /// Fails every request like a disconnected host.
    pub struct OfflineNetwork;

    #[async_trait]
    impl Network for OfflineNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            Err(Error::Network(format!("offline: {}", request.url)))
        }
    }

    pub fn text_of(result: &CallToolResult) -> String {
        result.content[0].as_text().map(|t| t.text.clone()).unwrap_or_default()
    }
}
