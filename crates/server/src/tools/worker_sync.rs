//! worker_sync tool implementation.
//!
//! Delivers the connectivity-restored trigger to the active agent.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{AppConfig, Registration};

/// Input parameters for worker_sync tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSyncParams {
    /// Sync tag to deliver. Defaults to the configured `sync_tag`.
    #[serde(default)]
    pub tag: Option<String>,
}

/// Output structure for worker_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSyncOutput {
    pub tag: String,
    /// False when no agent is active or the tag is not recognized.
    pub handled: bool,
}

/// Implementation of the worker_sync tool.
pub async fn sync_impl(
    registration: &Registration, config: &AppConfig, params: WorkerSyncParams,
) -> Result<CallToolResult, McpError> {
    let tag = params.tag.unwrap_or_else(|| config.sync_tag.clone());
    let handled = registration.sync(&tag).await;
    super::json_result(&WorkerSyncOutput { tag, handled })
}
