//! cache_list tool implementation.
//!
//! Lists buckets and the request keys each one holds.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Registration, RequestKey};

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Only list this bucket. Lists every bucket when omitted.
    #[serde(default)]
    pub bucket: Option<String>,
}

/// One bucket and its entries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BucketListing {
    pub name: String,
    /// Entry keys ordered by URL.
    pub entries: Vec<RequestKey>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub buckets: Vec<BucketListing>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(registration: &Registration, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let storage = registration.storage();
    let names = match params.bucket {
        Some(name) => {
            let exists = storage.bucket_names().await?.contains(&name);
            if exists { vec![name] } else { Vec::new() }
        }
        None => storage.bucket_names().await?,
    };

    let mut buckets = Vec::with_capacity(names.len());
    for name in names {
        let entries = storage.keys(&name).await?;
        buckets.push(BucketListing { name, entries });
    }

    crate::tools::json_result(&CacheListOutput { buckets })
}
