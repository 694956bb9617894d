//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - The offline-caching agent (install, activate, fetch routing)
//! - Versioned cache buckets with SQLite and in-memory backends
//! - Request/response values and URL-pattern routing
//! - Unified error types
//! - Configuration structures

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod network;
pub mod request;
pub mod response;
pub mod route;

pub use agent::{Agent, AgentConfig, AgentStatus, FetchOutcome, Registration, ResponseSource, WorkerState};
pub use cache::{CacheDb, CacheStorage, MemoryStorage};
pub use config::{AppConfig, PrecachePolicy};
pub use error::Error;
pub use network::Network;
pub use request::{Request, RequestKey};
pub use response::Response;
pub use route::{RouteTable, Strategy};
