//! Fixed-window submission limits per client.
//!
//! Both stores share the same semantics: the first request of a window sets
//! the count to 1, each accepted request increments it, and once the count
//! reaches the cap further requests are rejected without incrementing until
//! the window expires.

mod memory;
mod redis;

pub use memory::{MemoryRateLimitStore, sweeper_worker};
pub use redis::RedisRateLimitStore;

use async_trait::async_trait;
use formgate_common::GatewayError;

/// Result of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Accepted; `remaining` more submissions fit in this window
    Allowed { remaining: u32 },
    /// Cap reached for the current window
    Limited,
}

/// Storage behind the rate limiter
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one submission attempt for `key`
    async fn check(&self, key: &str) -> Result<RateDecision, GatewayError>;

    /// Whether the backend is reachable
    async fn ping(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str;
}
