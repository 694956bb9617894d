//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// What install does when a manifest entry cannot be fetched or stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrecachePolicy {
    /// All-or-nothing: store nothing and fail the install.
    #[default]
    Abort,
    /// Store whatever succeeded and report the rest.
    BestEffort,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current cache bucket. Bump it to replace every cached asset.
    ///
    /// Set via SHELLCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Absolute URL the precache manifest paths are relative to.
    ///
    /// Set via SHELLCACHE_SCOPE_URL environment variable.
    #[serde(default = "default_scope_url")]
    pub scope_url: String,

    /// App shell paths fetched and stored at install, in order.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Patterns of live-data endpoints that must never be cached.
    #[serde(default = "default_network_only")]
    pub network_only: Vec<String>,

    /// Patterns of third-party static origins served network-first.
    #[serde(default = "default_network_first")]
    pub network_first: Vec<String>,

    /// Failure handling during install.
    ///
    /// Set via SHELLCACHE_PRECACHE_POLICY (`abort` or `best_effort`).
    #[serde(default)]
    pub precache_policy: PrecachePolicy,

    /// Tag of the connectivity-restored trigger.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cache_version() -> String {
    "helix-register-v1".into()
}

fn default_scope_url() -> String {
    "http://localhost:8080/".into()
}

fn default_precache() -> Vec<String> {
    ["./index.html", "./manifest.json", "./icon-192.png", "./icon-512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_network_only() -> Vec<String> {
    vec!["script.google.com".into(), "googleapis.com".into()]
}

fn default_network_first() -> Vec<String> {
    vec!["cdn.sheetjs.com".into(), "cdnjs.cloudflare.com".into()]
}

fn default_sync_tag() -> String {
    "sync-sheets".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            scope_url: default_scope_url(),
            precache: default_precache(),
            network_only: default_network_only(),
            network_first: default_network_first(),
            precache_policy: PrecachePolicy::default(),
            sync_tag: default_sync_tag(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_version, "helix-register-v1");
        assert_eq!(config.scope_url, "http://localhost:8080/");
        assert_eq!(config.precache.len(), 4);
        assert_eq!(config.precache[0], "./index.html");
        assert_eq!(config.network_only, vec!["script.google.com", "googleapis.com"]);
        assert_eq!(config.network_first, vec!["cdn.sheetjs.com", "cdnjs.cloudflare.com"]);
        assert_eq!(config.precache_policy, PrecachePolicy::Abort);
        assert_eq!(config.sync_tag, "sync-sheets");
        assert_eq!(config.db_path, PathBuf::from("./shellcache.sqlite"));
        assert_eq!(config.max_bytes, 5_242_880);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "shellcache.toml",
                r#"
                cache_version = "helix-register-v2"
                precache = ["./index.html"]
                precache_policy = "best_effort"
                "#,
            )?;
            jail.set_env("SHELLCACHE_CONFIG_FILE", "shellcache.toml");
            jail.set_env("SHELLCACHE_CACHE_VERSION", "helix-register-v3");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.cache_version, "helix-register-v3");
            assert_eq!(config.precache, vec!["./index.html"]);
            assert_eq!(config.precache_policy, PrecachePolicy::BestEffort);
            assert_eq!(config.sync_tag, "sync-sheets");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SHELLCACHE_SCOPE_URL", "not a url");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "scope_url"));
            Ok(())
        });
    }
}
