//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::request::canonicalize;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Parsed scope URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` unless `scope_url` is an absolute http(s) URL.
    pub fn scope(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.scope_url).map_err(|e| invalid("scope_url", e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(invalid("scope_url", format!("unsupported scheme: {scheme}"))),
        }
    }

    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `cache_version` or `precache` is empty,
    /// and `ConfigError::Invalid` if:
    /// - `cache_version` contains `/`
    /// - `scope_url` is not an absolute http(s) URL
    /// - a precache path or routing pattern is blank or does not resolve
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "cache_version".into(),
                hint: "Set SHELLCACHE_CACHE_VERSION, e.g. helix-register-v1".into(),
            });
        }
        if self.cache_version.contains('/') {
            return Err(invalid("cache_version", "must not contain '/'"));
        }

        let scope = self.scope()?;

        if self.precache.is_empty() {
            return Err(ConfigError::Missing {
                field: "precache".into(),
                hint: "List at least the app entry point, e.g. ./index.html".into(),
            });
        }
        for path in &self.precache {
            canonicalize(path, Some(&scope)).map_err(|e| invalid("precache", format!("{path:?}: {e}")))?;
        }

        for (field, patterns) in [("network_only", &self.network_only), ("network_first", &self.network_first)] {
            for pattern in patterns {
                let body = pattern.strip_prefix("host:").unwrap_or(pattern);
                if body.trim().is_empty() {
                    return Err(invalid(field, "patterns must not be empty"));
                }
            }
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let shadowed: Vec<&String> = self
            .network_first
            .iter()
            .filter(|p| self.network_only.contains(*p))
            .collect();
        if !shadowed.is_empty() {
            tracing::warn!(
                patterns = ?shadowed,
                "Patterns listed under both network_only and network_first; \
                 network_only takes precedence"
            );
        }

        Ok(())
    }
}
