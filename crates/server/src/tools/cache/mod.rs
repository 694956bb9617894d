//! Cache-related MCP tools.
//!
//! This module provides read-only tools for inspecting cache buckets.

pub mod get;
pub mod list;

pub use get::{CacheGetParams, get_impl};
pub use list::{CacheListParams, list_impl};

use shellcache_core::{AppConfig, Registration};

/// Bucket to read when none is named: the active agent's, else the configured version.
pub(crate) async fn current_bucket(registration: &Registration, config: &AppConfig) -> String {
    match registration.active().await {
        Some(status) => status.version,
        None => config.cache_version.clone(),
    }
}
