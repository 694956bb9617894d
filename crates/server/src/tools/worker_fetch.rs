//! worker_fetch tool implementation.
//!
//! Sends one request through the active agent, as if the application had
//! issued it, and reports which strategy answered and from where.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Registration, Request, ResponseSource, Strategy};

/// Input parameters for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// The URL to request.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are ever cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, sent as UTF-8.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// URL of the response (after redirects, or as stored).
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub body_bytes: usize,
    /// Whether the body came from the cache or the network.
    pub source: ResponseSource,
    /// Strategy the request was routed to.
    pub strategy: Strategy,
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(registration: &Registration, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let mut request = Request::new(&params.method, &params.url).map_err(shellcache_core::Error::from)?;
    for (name, value) in params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let outcome = registration.fetch(request).await?;
    let response = outcome.response;

    let output = WorkerFetchOutput {
        content_type: response.content_type().map(str::to_string),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
        url: response.url,
        status: response.status,
        headers: response.headers,
        source: outcome.source,
        strategy: outcome.strategy,
    };
    super::json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{OfflineNetwork, StaticNetwork, text_of};
    use rmcp::model::ErrorCode;
    use shellcache_core::{AgentConfig, AppConfig, MemoryStorage};
    use std::sync::Arc;

    fn params(url: &str) -> WorkerFetchParams {
        WorkerFetchParams { url: url.into(), method: default_method(), headers: BTreeMap::new(), body: None }
    }

    #[tokio::test]
    async fn test_fetch_impl_uncontrolled_goes_to_network() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), Arc::new(StaticNetwork));

        let result = fetch_impl(&registration, params("https://example.com/data")).await.unwrap();
        let output: WorkerFetchOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.status, 200);
        assert_eq!(output.body, "ok");
        assert_eq!(output.source, ResponseSource::Network);
        assert_eq!(output.strategy, Strategy::NetworkOnly);
    }

    #[tokio::test]
    async fn test_fetch_impl_serves_precached_shell() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), Arc::new(StaticNetwork));
        let config = AgentConfig::from_app_config(&AppConfig::default()).unwrap();
        registration.register(config).await.unwrap();

        let result = fetch_impl(&registration, params("http://localhost:8080/index.html")).await.unwrap();
        let output: WorkerFetchOutput = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(output.source, ResponseSource::Cache);
        assert_eq!(output.strategy, Strategy::CacheFirst);
        assert_eq!(output.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_fetch_impl_network_failure() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), Arc::new(OfflineNetwork));

        let err = fetch_impl(&registration, params("https://script.google.com/exec")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32008));
    }

    #[tokio::test]
    async fn test_fetch_impl_invalid_url() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), Arc::new(StaticNetwork));

        let err = fetch_impl(&registration, params("ftp://example.com/file")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32003));
    }
}
