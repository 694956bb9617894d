//! Client code for shellcache.
//!
//! This crate provides the HTTP transport the agent uses to reach the
//! network, shared by the server binary.

pub mod fetch;

pub use fetch::{FetchConfig, HttpNetwork};
