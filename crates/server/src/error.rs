//! Structured errors for the shellcache server.
//!
//! Failures raised by the agent arrive as `shellcache_core::Error` and convert
//! to MCP errors on their own; these cover what only the server layer sees.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use shellcache_core::config::ConfigError;

/// Structured errors for the shellcache server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A tool argument produced an invalid agent configuration (e.g. a bad version override).
    #[error("INVALID_CONFIG: {0}")]
    Config(#[from] ConfigError),

    /// Tool output could not be encoded.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ServerError> for McpError {
    fn from(err: ServerError) -> Self {
        let code = match &err {
            ServerError::Config(_) => -32602,
            ServerError::Serialize(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_maps_to_invalid_params() {
        let err = ServerError::from(ConfigError::Invalid { field: "cache_version".into(), reason: "must not contain '/'".into() });
        let mcp: McpError = err.into();
        assert_eq!(mcp.code, ErrorCode(-32602));
        assert!(mcp.message.contains("INVALID_CONFIG"));
        assert!(mcp.message.contains("cache_version"));
    }
}
