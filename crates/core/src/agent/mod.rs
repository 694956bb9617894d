//! The offline-caching agent.
//!
//! An [`Agent`] owns one versioned bucket. It moves through
//! `parsed → installing → installed → activating → activated → redundant`:
//!
//! - install: precache the app shell into the bucket and request skip-waiting
//! - activate: delete every other bucket and claim open clients
//! - fetch: route each request through the [`RouteTable`]
//!
//! No transition is retried by the agent itself. Hosts drive instances
//! through a [`Registration`].

mod lifecycle;
mod registration;
mod strategy;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::Error;
use crate::cache::CacheStorage;
use crate::config::{AppConfig, ConfigError, PrecachePolicy};
use crate::network::Network;
use crate::response::Response;
use crate::route::{RouteTable, Strategy};

pub use lifecycle::{ActivateReport, InstallReport, PrecacheFailure};
pub use registration::{RegisterReport, Registration};

/// Lifecycle state of one agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an agent needs besides its storage and network.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Current bucket name.
    pub version: String,
    /// Base for the relative manifest paths.
    pub scope: Url,
    pub precache: Vec<String>,
    pub policy: PrecachePolicy,
    pub routes: RouteTable,
    pub sync_tag: String,
}

impl AgentConfig {
    /// Derive the agent settings from validated application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            version: config.cache_version.clone(),
            scope: config.scope()?,
            precache: config.precache.clone(),
            policy: config.precache_policy,
            routes: RouteTable::from_patterns(&config.network_only, &config.network_first),
            sync_tag: config.sync_tag.clone(),
        })
    }
}

/// Where the body of a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
}

/// Result of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
    /// Strategy actually applied. Non-GET requests always report `NetworkOnly`.
    pub strategy: Strategy,
}

impl FetchOutcome {
    pub(crate) fn network(response: Response, strategy: Strategy) -> Self {
        Self { response, source: ResponseSource::Network, strategy }
    }

    pub(crate) fn cache(response: Response, strategy: Strategy) -> Self {
        Self { response, source: ResponseSource::Cache, strategy }
    }
}

/// Point-in-time view of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AgentStatus {
    pub version: String,
    pub state: WorkerState,
    pub skip_waiting: bool,
    pub clients_claimed: bool,
}

/// One agent instance bound to a cache version.
pub struct Agent {
    config: AgentConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    clients_claimed: AtomicBool,
}

impl Agent {
    pub fn new(config: AgentConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            storage,
            network,
            state: RwLock::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            clients_claimed: AtomicBool::new(false),
        }
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Set once install succeeds: this instance wants to replace the current one now.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Set once activation succeeds: open clients are controlled without a reload.
    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> AgentStatus {
        AgentStatus {
            version: self.config.version.clone(),
            state: self.state().await,
            skip_waiting: self.skip_waiting_requested(),
            clients_claimed: self.clients_claimed(),
        }
    }

    /// Mark this instance as replaced. It stops handling new requests.
    pub async fn retire(&self) {
        *self.state.write().await = WorkerState::Redundant;
        tracing::info!(version = %self.config.version, "worker retired");
    }

    /// Connectivity-restored trigger. Returns whether the tag was recognized.
    ///
    /// Recognized tags are only logged; nothing is queued or replayed.
    pub fn handle_sync(&self, tag: &str) -> bool {
        if tag == self.config.sync_tag {
            tracing::info!(version = %self.config.version, tag, "background sync triggered, connectivity restored");
            true
        } else {
            tracing::debug!(tag, "ignoring unknown sync tag");
            false
        }
    }

    async fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::InvalidState { expected: from.to_string(), actual: state.to_string() });
        }
        *state = to;
        Ok(())
    }

    async fn set_state(&self, to: WorkerState) {
        *self.state.write().await = to;
    }
}
