//! The network seam.

use async_trait::async_trait;

use crate::Error;
use crate::request::Request;
use crate::response::Response;

/// Issues requests on behalf of the agent.
///
/// Any HTTP status, including 4xx and 5xx, is a successful `Ok(Response)`;
/// `Err` means the request produced no response at all (offline, DNS,
/// connection reset, timeout).
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
