//! Intercepted request descriptors and cache key normalization.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::hash::compute_cache_key;

/// Error type for request URL normalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for crate::Error {
    fn from(err: UrlError) -> Self {
        crate::Error::InvalidUrl(err.to_string())
    }
}

/// Normalize a request URL so equal resources map to one cache key.
///
/// Relative inputs (e.g. `./index.html`) are resolved against `base`.
/// The host is lower-cased, the fragment dropped and the query kept as-is.
pub fn canonicalize(input: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = match (Url::parse(trimmed), base) {
        (Ok(url), _) => url,
        (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => {
            base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
        }
        (Err(e), _) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Normalized `(method, url)` pair that identifies a bucket entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    /// Storage hash for this key.
    pub fn hash(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An outgoing request intercepted from the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Request {
    /// Build a request from raw parts, normalizing method and URL.
    pub fn new(method: &str, url: &str) -> Result<Self, UrlError> {
        let method = method.trim();
        let method = if method.is_empty() { "GET".to_string() } else { method.to_ascii_uppercase() };
        Ok(Self { method, url: canonicalize(url, None)?, headers: Vec::new(), body: None })
    }

    /// A `GET` for `url`.
    pub fn get(url: &str) -> Result<Self, UrlError> {
        Self::new("GET", url)
    }

    /// A `GET` for a path relative to `scope`, as used by the precache manifest.
    pub fn resolve(scope: &Url, path: &str) -> Result<Self, UrlError> {
        Ok(Self { method: "GET".into(), url: canonicalize(path, Some(scope))?, headers: Vec::new(), body: None })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Only `GET` requests may be read from or written to a bucket.
    pub fn is_cacheable(&self) -> bool {
        self.method == "GET"
    }

    pub fn key(&self) -> RequestKey {
        RequestKey { method: self.method.clone(), url: self.url.to_string() }
    }
}
