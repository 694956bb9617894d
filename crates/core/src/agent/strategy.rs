//! Request routing: network-only, network-first and cache-first.

use std::sync::Arc;

use super::{Agent, FetchOutcome, WorkerState};
use crate::Error;
use crate::cache::CacheStorage;
use crate::network::Network;
use crate::request::{Request, RequestKey};
use crate::response::Response;
use crate::route::Strategy;

impl Agent {
    /// Route one intercepted request.
    ///
    /// Only an `activated` agent handles requests. Non-GET requests go to the
    /// network whatever their classification.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome, Error> {
        let state = self.state().await;
        if state != WorkerState::Activated {
            return Err(Error::InvalidState { expected: WorkerState::Activated.to_string(), actual: state.to_string() });
        }

        let strategy = if request.is_cacheable() {
            self.config.routes.classify(&request.url)
        } else {
            Strategy::NetworkOnly
        };
        tracing::debug!(url = %request.url, method = %request.method, %strategy, "routing request");

        match strategy {
            Strategy::NetworkOnly => self.network_only(&request).await,
            Strategy::NetworkFirst => self.network_first(&request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
        }
    }

    async fn network_only(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let response = self.network.fetch(request).await?;
        Ok(FetchOutcome::network(response, Strategy::NetworkOnly))
    }

    async fn network_first(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let version = &self.config.version;
        let key = request.key();

        match self.network.fetch(request).await {
            Ok(response) => {
                store(self.storage.as_ref(), version, &key, &response).await;
                Ok(FetchOutcome::network(response, Strategy::NetworkFirst))
            }
            Err(err) => {
                tracing::debug!(%key, error = %err, "network failed, falling back to cache");
                match self.storage.get(version, &key).await {
                    Ok(Some(cached)) => Ok(FetchOutcome::cache(cached, Strategy::NetworkFirst)),
                    Ok(None) => Err(err),
                    Err(cache_err) => {
                        tracing::warn!(%key, error = %cache_err, "cache read failed");
                        Err(err)
                    }
                }
            }
        }
    }

    async fn cache_first(&self, request: Request) -> Result<FetchOutcome, Error> {
        let version = self.config.version.clone();
        let key = request.key();

        let cached = self.storage.get(&version, &key).await.unwrap_or_else(|err| {
            tracing::warn!(%key, error = %err, "cache read failed");
            None
        });

        let refresh = tokio::spawn(revalidate(self.storage.clone(), self.network.clone(), version, request, key));

        // A hit returns now; the refresh keeps running detached.
        if let Some(response) = cached {
            return Ok(FetchOutcome::cache(response, Strategy::CacheFirst));
        }

        match refresh.await {
            Ok(result) => result.map(|response| FetchOutcome::network(response, Strategy::CacheFirst)),
            Err(join_err) => Err(Error::Network(format!("refresh task failed: {join_err}"))),
        }
    }
}

/// Fetch and, on a 200, overwrite the entry.
async fn revalidate(
    storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>, version: String, request: Request, key: RequestKey,
) -> Result<Response, Error> {
    let response = match network.fetch(&request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(%key, error = %err, "background refresh failed");
            return Err(err);
        }
    };

    if response.status == 200 {
        store(storage.as_ref(), &version, &key, &response).await;
    }

    Ok(response)
}

/// Best-effort write; a failed put never fails the request.
///
/// A retired agent's bucket may already be gone, in which case nothing is stored.
async fn store(storage: &dyn CacheStorage, bucket: &str, key: &RequestKey, response: &Response) {
    match storage.put(bucket, key, response).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(%bucket, %key, "bucket no longer exists; response not stored"),
        Err(err) => tracing::warn!(%bucket, %key, error = %err, "cache write failed"),
    }
}
