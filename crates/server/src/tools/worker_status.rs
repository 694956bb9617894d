//! worker_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::Registration;
use shellcache_core::agent::AgentStatus;

/// Input parameters for worker_status tool. Takes no arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusParams {}

/// Output structure for worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusOutput {
    /// The agent currently handling requests.
    pub active: Option<AgentStatus>,
    /// An installed agent whose activation failed.
    pub waiting: Option<AgentStatus>,
    /// Every bucket in storage, sorted.
    pub buckets: Vec<String>,
}

/// Implementation of the worker_status tool.
pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let output = WorkerStatusOutput {
        active: registration.active().await,
        waiting: registration.waiting().await,
        buckets: registration.storage().bucket_names().await?,
    };
    super::json_result(&output)
}
