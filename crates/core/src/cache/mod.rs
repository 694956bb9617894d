//! Versioned bucket storage for response snapshots.
//!
//! - [`CacheStorage`]: the open/get/put/keys/list/delete seam the agent uses
//! - [`CacheDb`]: SQLite backend via tokio-rusqlite, WAL mode, migrations
//! - [`MemoryStorage`]: in-memory backend with access counters
//!
//! There is no per-entry expiry; a bucket is only ever dropped whole.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStorage;
pub use storage::CacheStorage;
