//! Host-side ownership of agent instances.
//!
//! A `Registration` plays the role the platform plays for a service worker:
//! it installs new versions, swaps the active instance, and routes requests
//! to whichever instance currently controls the application.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use super::lifecycle::{ActivateReport, InstallReport};
use super::{Agent, AgentConfig, AgentStatus, FetchOutcome};
use crate::Error;
use crate::cache::CacheStorage;
use crate::network::Network;
use crate::request::Request;
use crate::route::Strategy;

/// Result of registering a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RegisterReport {
    pub install: InstallReport,
    pub activate: ActivateReport,
    /// Version of the instance that was retired, if any.
    pub replaced: Option<String>,
}

/// Owner of the active agent (and of one that installed but failed to activate).
pub struct Registration {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    active: RwLock<Option<Arc<Agent>>>,
    waiting: RwLock<Option<Arc<Agent>>>,
    updating: Mutex<()>,
}

impl Registration {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self { storage, network, active: RwLock::new(None), waiting: RwLock::new(None), updating: Mutex::new(()) }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Install a new agent and, once installed, let it take over.
    ///
    /// If install fails the current active agent keeps serving. If activation
    /// fails the previous agent is already retired: requests go straight to
    /// the network and the new agent waits for [`Self::activate_waiting`].
    pub async fn register(&self, config: AgentConfig) -> Result<RegisterReport, Error> {
        let _updating = self.updating.lock().await;

        let agent = Arc::new(Agent::new(config, self.storage.clone(), self.network.clone()));
        let install = agent.install().await?;

        let (activate, replaced) = self.promote(agent).await?;
        Ok(RegisterReport { install, activate, replaced })
    }

    /// Retry activation of an agent whose previous activation failed.
    pub async fn activate_waiting(&self) -> Result<ActivateReport, Error> {
        let _updating = self.updating.lock().await;

        let agent = self.waiting.write().await.take().ok_or_else(|| Error::InvalidState {
            expected: "a waiting worker".into(),
            actual: "none".into(),
        })?;

        let (report, _) = self.promote(agent).await?;
        Ok(report)
    }

    /// Swap `agent` in as the active instance.
    ///
    /// The write lock on `active` is held throughout. It is only granted once
    /// in-flight requests (which hold the read lock) have finished, and
    /// requests arriving mid-swap wait for the new instance instead of
    /// reaching a retired one.
    async fn promote(&self, agent: Arc<Agent>) -> Result<(ActivateReport, Option<String>), Error> {
        let mut active = self.active.write().await;

        let replaced = match active.take() {
            Some(previous) => {
                previous.retire().await;
                Some(previous.version().to_string())
            }
            None => None,
        };

        match agent.activate().await {
            Ok(report) => {
                *active = Some(agent);
                Ok((report, replaced))
            }
            Err(err) => {
                tracing::warn!(version = %agent.version(), "activation failed; worker left waiting");
                *self.waiting.write().await = Some(agent);
                Err(err)
            }
        }
    }

    /// Route a request to the active agent.
    ///
    /// Without one the application is uncontrolled and the request goes
    /// straight to the network. The read lock is held until the request
    /// settles, so a swap never retires the agent serving it.
    pub async fn fetch(&self, request: Request) -> Result<FetchOutcome, Error> {
        let active = self.active.read().await;
        match active.as_ref() {
            Some(agent) => agent.handle_fetch(request).await,
            None => {
                tracing::debug!(url = %request.url, "no active worker; passing request through");
                let response = self.network.fetch(&request).await?;
                Ok(FetchOutcome::network(response, Strategy::NetworkOnly))
            }
        }
    }

    /// Deliver the connectivity-restored trigger. False if nothing handled it.
    pub async fn sync(&self, tag: &str) -> bool {
        match self.active.read().await.as_ref() {
            Some(agent) => agent.handle_sync(tag),
            None => false,
        }
    }

    pub async fn active(&self) -> Option<AgentStatus> {
        let agent = self.active.read().await.clone();
        match agent {
            Some(agent) => Some(agent.status().await),
            None => None,
        }
    }

    pub async fn waiting(&self) -> Option<AgentStatus> {
        let agent = self.waiting.read().await.clone();
        match agent {
            Some(agent) => Some(agent.status().await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::super::testing::ScriptedNetwork;
    use super::super::{ResponseSource, WorkerState};
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::config::AppConfig;
    use crate::request::RequestKey;
    use crate::response::Response;

    fn config(version: &str) -> AgentConfig {
        let app = AppConfig { cache_version: version.into(), precache: vec!["./index.html".into()], ..Default::default() };
        AgentConfig::from_app_config(&app).unwrap()
    }

    fn online() -> Arc<ScriptedNetwork> {
        let network = Arc::new(ScriptedNetwork::new());
        network.reply("http://localhost:8080/index.html", 200, "<html>");
        network
    }

    #[tokio::test]
    async fn test_register_activates_first_version() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), online());
        let report = registration.register(config("v1")).await.unwrap();

        assert_eq!(report.install.cached, vec!["./index.html"]);
        assert!(report.replaced.is_none());

        let status = registration.active().await.unwrap();
        assert_eq!(status.version, "v1");
        assert_eq!(status.state, WorkerState::Activated);
        assert!(status.clients_claimed);
    }

    #[tokio::test]
    async fn test_register_replaces_previous_version() {
        let storage = Arc::new(MemoryStorage::new());
        let registration = Registration::new(storage.clone(), online());
        registration.register(config("v1")).await.unwrap();
        let report = registration.register(config("v2")).await.unwrap();

        assert_eq!(report.replaced.as_deref(), Some("v1"));
        assert_eq!(report.activate.deleted, vec!["v1"]);
        assert_eq!(registration.active().await.unwrap().version, "v2");
        assert_eq!(storage.bucket_names().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_active() {
        let network = online();
        let storage = Arc::new(MemoryStorage::new());
        let registration = Registration::new(storage.clone(), network.clone());
        registration.register(config("v1")).await.unwrap();

        network.go_offline();
        let err = registration.register(config("v2")).await.unwrap_err();
        assert!(matches!(err, Error::PrecacheFailed { .. }));

        let status = registration.active().await.unwrap();
        assert_eq!(status.version, "v1");
        assert_eq!(status.state, WorkerState::Activated);

        let outcome = registration
            .fetch(Request::get("http://localhost:8080/index.html").unwrap())
            .await
            .unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert!(storage.bucket_names().await.unwrap().contains(&"v1".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_without_active_worker_passes_through() {
        let storage = Arc::new(MemoryStorage::new());
        let registration = Registration::new(storage.clone(), online());

        let outcome = registration
            .fetch(Request::get("http://localhost:8080/index.html").unwrap())
            .await
            .unwrap();
        assert_eq!(outcome.source, ResponseSource::Network);
        assert_eq!(storage.reads(), 0);
        assert_eq!(storage.writes(), 0);
    }

    #[tokio::test]
    async fn test_sync_requires_active_worker() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), online());
        assert!(!registration.sync("sync-sheets").await);

        registration.register(config("v1")).await.unwrap();
        assert!(registration.sync("sync-sheets").await);
        assert!(!registration.sync("other").await);
    }

    /// Memory storage whose bucket deletion fails until `allow_delete` is set.
    #[derive(Default)]
    struct StickyStorage {
        inner: MemoryStorage,
        allow_delete: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CacheStorage for StickyStorage {
        async fn open(&self, bucket: &str) -> Result<(), Error> {
            self.inner.open(bucket).await
        }
        async fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
            self.inner.get(bucket, key).await
        }
        async fn put(&self, bucket: &str, key: &RequestKey, response: &Response) -> Result<bool, Error> {
            self.inner.put(bucket, key, response).await
        }
        async fn keys(&self, bucket: &str) -> Result<Vec<RequestKey>, Error> {
            self.inner.keys(bucket).await
        }
        async fn bucket_names(&self) -> Result<Vec<String>, Error> {
            self.inner.bucket_names().await
        }
        async fn delete(&self, bucket: &str) -> Result<bool, Error> {
            if self.allow_delete.load(std::sync::atomic::Ordering::SeqCst) {
                self.inner.delete(bucket).await
            } else {
                Err(Error::InvalidInput("bucket locked".into()))
            }
        }
    }

    #[tokio::test]
    async fn test_failed_activation_can_be_retried() {
        let storage = Arc::new(StickyStorage::default());
        storage.open("v0").await.unwrap();
        let registration = Registration::new(storage.clone(), online());

        let err = registration.register(config("v1")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(registration.active().await.is_none());
        assert_eq!(registration.waiting().await.unwrap().state, WorkerState::Installed);

        storage.allow_delete.store(true, std::sync::atomic::Ordering::SeqCst);
        let report = registration.activate_waiting().await.unwrap();
        assert_eq!(report.deleted, vec!["v0"]);
        assert!(registration.waiting().await.is_none());
        assert_eq!(registration.active().await.unwrap().state, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_activate_waiting_without_worker() {
        let registration = Registration::new(Arc::new(MemoryStorage::new()), online());
        let err = registration.activate_waiting().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    /// Holds requests for one URL until `gate` gets a permit; everything else
    /// goes straight through.
    struct HoldOne {
        inner: ScriptedNetwork,
        url: &'static str,
        gate: Arc<Semaphore>,
        arrived: AtomicBool,
    }

    impl HoldOne {
        fn new(url: &'static str) -> Self {
            let inner = ScriptedNetwork::new();
            inner.reply("http://localhost:8080/index.html", 200, "<html>");
            inner.reply(url, 200, "fresh");
            Self { inner, url, gate: Arc::new(Semaphore::new(0)), arrived: AtomicBool::new(false) }
        }

        async fn wait_until_held(&self) {
            tokio::time::timeout(Duration::from_secs(5), async {
                while !self.arrived.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("request never reached the network");
        }
    }

    #[async_trait]
    impl Network for HoldOne {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            if request.url.as_str() == self.url {
                self.arrived.store(true, Ordering::SeqCst);
                let _permit = self.gate.acquire().await.expect("gate closed");
            }
            self.inner.fetch(request).await
        }
    }

    #[tokio::test]
    async fn test_retired_refresh_does_not_recreate_bucket() {
        const APP: &str = "http://localhost:8080/app.js";
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(HoldOne::new(APP));
        let registration = Registration::new(storage.clone(), network.clone());
        registration.register(config("v1")).await.unwrap();
        let app_key = Request::get(APP).unwrap().key();
        storage.put("v1", &app_key, &Response::new(APP, 200, "stale")).await.unwrap();

        // Cache hit on v1; its refresh is left hanging on the network.
        let outcome = registration.fetch(Request::get(APP).unwrap()).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        network.wait_until_held().await;

        registration.register(config("v2")).await.unwrap();
        assert_eq!(storage.bucket_names().await.unwrap(), vec!["v2"]);

        let writes = storage.writes();
        network.gate.add_permits(1);
        tokio::time::timeout(Duration::from_secs(5), async {
            while storage.writes() == writes {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("refresh never attempted its write");

        assert_eq!(storage.bucket_names().await.unwrap(), vec!["v2"]);
        assert!(storage.get("v2", &app_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_swap_waits_for_in_flight_request() {
        const SHEETS: &str = "https://script.google.com/macros/s/abc/exec";
        let network = Arc::new(HoldOne::new(SHEETS));
        let registration = Arc::new(Registration::new(Arc::new(MemoryStorage::new()), network.clone()));
        registration.register(config("v1")).await.unwrap();

        let in_flight = tokio::spawn({
            let registration = registration.clone();
            async move { registration.fetch(Request::get(SHEETS).unwrap()).await }
        });
        network.wait_until_held().await;

        let swap = tokio::spawn({
            let registration = registration.clone();
            async move { registration.register(config("v2")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!swap.is_finished());

        network.gate.add_permits(1);
        let outcome = in_flight.await.unwrap().unwrap();
        assert_eq!(outcome.strategy, Strategy::NetworkOnly);
        assert_eq!(outcome.response.body.as_ref(), b"fresh");

        let report = swap.await.unwrap().unwrap();
        assert_eq!(report.replaced.as_deref(), Some("v1"));
    }
}
