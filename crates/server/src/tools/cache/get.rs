//! cache_get tool implementation.
//!
//! Retrieves a stored response by request URL and method.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{AppConfig, Error, Registration, Request, RequestKey};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// The request URL the entry was stored under.
    pub url: String,

    /// Request method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Bucket to read. Defaults to the active version.
    #[serde(default)]
    pub bucket: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub bucket: String,
    pub key: RequestKey,
    /// Storage hash of `key`.
    pub hash: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossily.
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(
    registration: &Registration, config: &AppConfig, params: CacheGetParams,
) -> Result<CallToolResult, McpError> {
    let method = params.method.as_deref().unwrap_or("GET");
    let key = Request::new(method, &params.url).map_err(Error::from)?.key();
    let bucket = match params.bucket {
        Some(bucket) => bucket,
        None => super::current_bucket(registration, config).await,
    };

    let response = registration
        .storage()
        .get(&bucket, &key)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{key} in {bucket}")))?;

    let output = CacheGetOutput {
        hash: key.hash(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        body_bytes: response.body.len(),
        status: response.status,
        headers: response.headers,
        bucket,
        key,
    };
    crate::tools::json_result(&output)
}
