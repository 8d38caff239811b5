//! Rotating client identities for outgoing requests
//!
//! The remote source throttles clients that repeat the same `User-Agent`, so
//! every request picks one at random from a pool of desktop browser strings.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use std::sync::Arc;

const DEFAULT_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

static DEFAULT_POOL: Lazy<Arc<UserAgentPool>> = Lazy::new(|| Arc::new(UserAgentPool::default()));

/// Source of `User-Agent` header values
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Vec<String>,
}

impl UserAgentPool {
    /// Create a pool from explicit values. Falls back to the built-in list when empty.
    pub fn new(agents: Vec<String>) -> Self {
        if agents.is_empty() {
            return Self::default();
        }
        Self { agents }
    }

    /// Shared pool with the built-in browser identities
    pub fn shared() -> Arc<Self> {
        DEFAULT_POOL.clone()
    }

    /// Pick a random identity
    pub fn random(&self) -> &str {
        self.agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_AGENTS[0])
    }

    /// Number of identities in the pool
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the pool is empty (never true for constructed pools)
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self {
            agents: DEFAULT_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
