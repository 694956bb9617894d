//! worker_register tool implementation.
//!
//! Installs a new agent version and lets it take over from the current one.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{AgentConfig, AppConfig, Registration};

use crate::error::ServerError;

/// Input parameters for worker_register tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerRegisterParams {
    /// Cache version to install. Defaults to the configured `cache_version`.
    #[serde(default)]
    pub version: Option<String>,
}

/// Implementation of the worker_register tool.
///
/// Returns the `RegisterReport` as JSON.
pub async fn register_impl(
    registration: &Registration, config: &AppConfig, params: WorkerRegisterParams,
) -> Result<CallToolResult, McpError> {
    let mut config = config.clone();
    if let Some(version) = params.version {
        config.cache_version = version;
    }
    let agent_config = AgentConfig::from_app_config(&config).map_err(ServerError::from)?;

    let report = registration.register(agent_config).await?;
    super::json_result(&report)
}
