//! The bucket storage seam.
//!
//! The agent never touches a concrete store; it holds an
//! `Arc<dyn CacheStorage>` so tests can swap in [`super::MemoryStorage`].

use async_trait::async_trait;

use crate::Error;
use crate::request::RequestKey;
use crate::response::Response;

/// Named, versioned buckets of response snapshots.
///
/// `put` overwrites by key, so concurrent writers for one key commute (last
/// write wins). Only `open` creates buckets: a write into a bucket that does
/// not exist (never opened, or already deleted) stores nothing.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the bucket if it does not exist. Opening an existing bucket is a no-op.
    async fn open(&self, bucket: &str) -> Result<(), Error>;

    /// Look up an entry. A missing bucket reads as a miss.
    async fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Insert or overwrite an entry. Returns false if the bucket does not exist.
    async fn put(&self, bucket: &str, key: &RequestKey, response: &Response) -> Result<bool, Error>;

    /// Keys stored in a bucket, ordered by URL.
    async fn keys(&self, bucket: &str) -> Result<Vec<RequestKey>, Error>;

    /// Names of all existing buckets, sorted.
    async fn bucket_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a bucket and all its entries. Returns whether it existed.
    async fn delete(&self, bucket: &str) -> Result<bool, Error>;
}
