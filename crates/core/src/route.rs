//! Request classification.
//!
//! An ordered list of `(Matcher, Strategy)` rules evaluated top to bottom;
//! the first match wins and anything unmatched falls back to
//! [`Strategy::CacheFirst`], so classification is total.

use serde::{Deserialize, Serialize};
use url::Url;

/// How an intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Always the network; the cache is never read or written.
    NetworkOnly,
    /// Network, storing every response; the cached copy only on network failure.
    NetworkFirst,
    /// Cached copy immediately, refreshed in the background on a 200.
    CacheFirst,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::NetworkOnly => "network_only",
            Strategy::NetworkFirst => "network_first",
            Strategy::CacheFirst => "cache_first",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL predicate of a routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// The full URL contains this substring.
    Contains(String),
    /// The host equals this domain or is a subdomain of it.
    Host(String),
}

impl Matcher {
    /// Parse a configured pattern. `host:example.com` is a host match,
    /// anything else a substring match.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_prefix("host:") {
            Some(domain) => Matcher::Host(domain.trim().trim_start_matches('.').to_ascii_lowercase()),
            None => Matcher::Contains(pattern.to_string()),
        }
    }

    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Matcher::Contains(needle) => url.as_str().contains(needle.as_str()),
            Matcher::Host(domain) => url.host_str().is_some_and(|host| {
                host == domain || (host.ends_with(domain.as_str()) && host[..host.len() - domain.len()].ends_with('.'))
            }),
        }
    }
}

/// A single dispatch rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub strategy: Strategy,
}

/// Ordered dispatch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<Rule>,
    fallback: Strategy,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self { rules: Vec::new(), fallback: Strategy::CacheFirst }
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule after all existing ones.
    pub fn rule(mut self, matcher: Matcher, strategy: Strategy) -> Self {
        self.rules.push(Rule { matcher, strategy });
        self
    }

    /// Build the standard table: network-only patterns first, then network-first.
    pub fn from_patterns<S: AsRef<str>>(network_only: &[S], network_first: &[S]) -> Self {
        let only = network_only
            .iter()
            .map(|p| Rule { matcher: Matcher::parse(p.as_ref()), strategy: Strategy::NetworkOnly });
        let first = network_first
            .iter()
            .map(|p| Rule { matcher: Matcher::parse(p.as_ref()), strategy: Strategy::NetworkFirst });
        Self { rules: only.chain(first).collect(), fallback: Strategy::CacheFirst }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn fallback(&self) -> Strategy {
        self.fallback
    }

    pub fn classify(&self, url: &Url) -> Strategy {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(url))
            .map_or(self.fallback, |rule| rule.strategy)
    }
}
