//! Install and activate.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use super::{Agent, WorkerState};
use crate::Error;
use crate::config::PrecachePolicy;
use crate::request::Request;
use crate::response::Response;

/// A manifest entry that did not make it into the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PrecacheFailure {
    pub path: String,
    pub reason: String,
}

/// What install stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub version: String,
    /// Manifest paths now in the bucket, in manifest order.
    pub cached: Vec<String>,
    /// Always empty under `PrecachePolicy::Abort`.
    pub failed: Vec<PrecacheFailure>,
}

/// What activate removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub version: String,
    /// Stale buckets deleted, sorted by name.
    pub deleted: Vec<String>,
}

impl Agent {
    /// Open the bucket and precache the manifest.
    ///
    /// On success the instance is `installed` and has requested skip-waiting.
    /// On failure it is `redundant`; the bucket may exist but, under
    /// `PrecachePolicy::Abort`, holds nothing written by this install.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing).await?;
        let version = &self.config.version;
        tracing::info!(%version, entries = self.config.precache.len(), "installing");

        match self.precache().await {
            Ok(report) => {
                self.skip_waiting.store(true, std::sync::atomic::Ordering::SeqCst);
                self.set_state(WorkerState::Installed).await;
                tracing::info!(
                    %version,
                    cached = report.cached.len(),
                    failed = report.failed.len(),
                    "installed; requesting immediate takeover"
                );
                Ok(report)
            }
            Err(err) => {
                self.set_state(WorkerState::Redundant).await;
                tracing::error!(%version, error = %err, "install failed");
                Err(err)
            }
        }
    }

    async fn precache(&self) -> Result<InstallReport, Error> {
        let version = &self.config.version;
        self.storage.open(version).await?;

        let fetches = self.config.precache.iter().map(|path| async move {
            let outcome = match Request::resolve(&self.config.scope, path) {
                Ok(request) => self.fetch_manifest_entry(&request).await.map(|response| (request, response)),
                Err(err) => Err(err.to_string()),
            };
            (path.clone(), outcome)
        });

        let mut fetched = Vec::new();
        let mut failed = Vec::new();
        for (path, outcome) in join_all(fetches).await {
            match outcome {
                Ok(pair) => fetched.push((path, pair)),
                Err(reason) => {
                    tracing::warn!(%version, %path, %reason, "precache entry failed");
                    failed.push(PrecacheFailure { path, reason });
                }
            }
        }

        let policy = self.config.policy;
        if policy == PrecachePolicy::Abort
            && let Some(first) = failed.first()
        {
            return Err(Error::PrecacheFailed { path: first.path.clone(), reason: first.reason.clone() });
        }

        let mut cached = Vec::with_capacity(fetched.len());
        for (path, (request, response)) in fetched {
            let reason = match self.storage.put(version, &request.key(), &response).await {
                Ok(true) => {
                    cached.push(path);
                    continue;
                }
                Ok(false) => "bucket deleted during install".to_string(),
                Err(err) => err.to_string(),
            };
            if policy == PrecachePolicy::Abort {
                return Err(Error::PrecacheFailed { path, reason });
            }
            tracing::warn!(%version, %path, %reason, "precache write failed");
            failed.push(PrecacheFailure { path, reason });
        }

        Ok(InstallReport { version: version.clone(), cached, failed })
    }

    /// A manifest entry must produce a 2xx response to count.
    async fn fetch_manifest_entry(&self, request: &Request) -> Result<Response, String> {
        let response = self.network.fetch(request).await.map_err(|e| e.to_string())?;
        if !response.is_ok() {
            return Err(format!("status {}", response.status));
        }
        Ok(response)
    }

    /// Delete every bucket except the current one and claim open clients.
    ///
    /// If cleanup fails the instance goes back to `installed`.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating).await?;
        let version = &self.config.version;
        tracing::info!(%version, "activating");

        match self.delete_stale_buckets().await {
            Ok(deleted) => {
                self.clients_claimed.store(true, std::sync::atomic::Ordering::SeqCst);
                self.set_state(WorkerState::Activated).await;
                tracing::info!(%version, deleted = deleted.len(), "activated; clients claimed");
                Ok(ActivateReport { version: version.clone(), deleted })
            }
            Err(err) => {
                self.set_state(WorkerState::Installed).await;
                tracing::error!(%version, error = %err, "activation failed");
                Err(err)
            }
        }
    }

    async fn delete_stale_buckets(&self) -> Result<Vec<String>, Error> {
        let version = &self.config.version;
        let stale: Vec<String> = self
            .storage
            .bucket_names()
            .await?
            .into_iter()
            .filter(|name| name != version)
            .collect();

        let deletions = stale.iter().map(|name| async move {
            tracing::info!(bucket = %name, "deleting stale bucket");
            self.storage.delete(name).await
        });

        for result in join_all(deletions).await {
            result?;
        }

        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::AgentConfig;
    use super::super::testing::ScriptedNetwork;
    use super::*;
    use crate::cache::{CacheStorage, MemoryStorage};
    use crate::config::AppConfig;

    const SHELL: [&str; 4] = [
        "http://localhost:8080/index.html",
        "http://localhost:8080/manifest.json",
        "http://localhost:8080/icon-192.png",
        "http://localhost:8080/icon-512.png",
    ];

    fn online() -> ScriptedNetwork {
        let network = ScriptedNetwork::new();
        for url in SHELL {
            network.reply(url, 200, "asset");
        }
        network
    }

    fn agent_with(
        policy: PrecachePolicy, storage: Arc<MemoryStorage>, network: ScriptedNetwork,
    ) -> Agent {
        let app = AppConfig { precache_policy: policy, ..Default::default() };
        Agent::new(AgentConfig::from_app_config(&app).unwrap(), storage, Arc::new(network))
    }

    #[tokio::test]
    async fn test_install_caches_manifest_in_order() {
        let storage = Arc::new(MemoryStorage::new());
        let agent = agent_with(PrecachePolicy::Abort, storage.clone(), online());

        let report = agent.install().await.unwrap();
        assert_eq!(report.cached, vec!["./index.html", "./manifest.json", "./icon-192.png", "./icon-512.png"]);
        assert!(report.failed.is_empty());
        assert_eq!(agent.state().await, WorkerState::Installed);
        assert!(agent.skip_waiting_requested());

        let keys = storage.keys("helix-register-v1").await.unwrap();
        assert_eq!(keys.len(), 4);
    }

    #[tokio::test]
    async fn test_install_abort_stores_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let network = online();
        network.reply("http://localhost:8080/icon-512.png", 404, "not found");
        let agent = agent_with(PrecachePolicy::Abort, storage.clone(), network);

        let err = agent.install().await.unwrap_err();
        assert!(matches!(err, Error::PrecacheFailed { ref path, ref reason } if path == "./icon-512.png" && reason == "status 404"));
        assert_eq!(agent.state().await, WorkerState::Redundant);
        assert!(!agent.skip_waiting_requested());
        assert!(storage.keys("helix-register-v1").await.unwrap().is_empty());
        assert_eq!(storage.writes(), 0);
    }

    #[tokio::test]
    async fn test_install_best_effort_keeps_successes() {
        let storage = Arc::new(MemoryStorage::new());
        let network = ScriptedNetwork::new();
        network.reply("http://localhost:8080/index.html", 200, "<html>");
        network.reply("http://localhost:8080/manifest.json", 200, "{}");
        let agent = agent_with(PrecachePolicy::BestEffort, storage.clone(), network);

        let report = agent.install().await.unwrap();
        assert_eq!(report.cached, vec!["./index.html", "./manifest.json"]);
        let failed: Vec<&str> = report.failed.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(failed, vec!["./icon-192.png", "./icon-512.png"]);
        assert!(report.failed[0].reason.contains("NETWORK_ERROR"));
        assert_eq!(agent.state().await, WorkerState::Installed);
        assert_eq!(storage.keys("helix-register-v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_install_twice_rejected() {
        let agent = agent_with(PrecachePolicy::Abort, Arc::new(MemoryStorage::new()), online());
        agent.install().await.unwrap();
        let err = agent.install().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert_eq!(agent.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let agent = agent_with(PrecachePolicy::Abort, Arc::new(MemoryStorage::new()), online());
        let err = agent.activate().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { ref expected, .. } if expected == "installed"));
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_buckets() {
        let storage = Arc::new(MemoryStorage::new());
        storage.open("helix-register-v0").await.unwrap();
        storage.open("unrelated").await.unwrap();
        let agent = agent_with(PrecachePolicy::Abort, storage.clone(), online());

        agent.install().await.unwrap();
        let report = agent.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["helix-register-v0", "unrelated"]);
        assert_eq!(storage.bucket_names().await.unwrap(), vec!["helix-register-v1"]);
        assert_eq!(agent.state().await, WorkerState::Activated);
        assert!(agent.clients_claimed());
    }
}
