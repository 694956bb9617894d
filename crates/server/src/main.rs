//! shellcache server entry point.
//!
//! Boots the MCP server on stdio transport with one agent registration backed
//! by the SQLite cache and a reqwest transport. Logging goes to stderr to
//! avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchConfig, HttpNetwork};
use shellcache_core::{AgentConfig, AppConfig, CacheDb, Registration};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    let agent_config = AgentConfig::from_app_config(&config).context("validating configuration")?;

    tracing::info!(
        version = %config.cache_version,
        scope = %config.scope_url,
        db_path = %config.db_path.display(),
        "Starting shellcache server on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path).await.context("opening cache database")?;
    let network = HttpNetwork::new(FetchConfig::from(&config))?;
    let registration = Arc::new(Registration::new(Arc::new(cache), Arc::new(network)));

    // The server still answers when the origin is unreachable at boot.
    match registration.register(agent_config).await {
        Ok(report) => tracing::info!(
            version = %report.install.version,
            cached = report.install.cached.len(),
            deleted = report.activate.deleted.len(),
            "initial registration complete"
        ),
        Err(err) => tracing::warn!(error = %err, "initial registration failed; requests pass through to the network"),
    }

    let handler = handler::ShellCacheServer::new(registration, Arc::new(config));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
