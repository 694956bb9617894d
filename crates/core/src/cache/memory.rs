//! In-memory bucket storage.
//!
//! Used by tests and by hosts that do not need entries to survive a restart.
//! Every `get` and `put` is counted so callers can assert that a code path
//! never touched the cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::storage::CacheStorage;
use crate::Error;
use crate::request::RequestKey;
use crate::response::Response;

type Bucket = HashMap<RequestKey, Response>;

/// Process-local [`CacheStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: RwLock<BTreeMap<String, Bucket>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put` calls served so far, including ones that stored nothing.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        self.buckets.write().await.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let buckets = self.buckets.read().await;
        Ok(buckets.get(bucket).and_then(|entries| entries.get(key)).cloned())
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &Response) -> Result<bool, Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        match self.buckets.write().await.get_mut(bucket) {
            Some(entries) => {
                entries.insert(key.clone(), response.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, bucket: &str) -> Result<Vec<RequestKey>, Error> {
        let buckets = self.buckets.read().await;
        let mut keys: Vec<RequestKey> = buckets
            .get(bucket)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort_by(|a, b| (&a.url, &a.method).cmp(&(&b.url, &b.method)));
        Ok(keys)
    }

    async fn bucket_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.buckets.read().await.keys().cloned().collect())
    }

    async fn delete(&self, bucket: &str) -> Result<bool, Error> {
        Ok(self.buckets.write().await.remove(bucket).is_some())
    }
}
