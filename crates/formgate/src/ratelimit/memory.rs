//! Process-local rate-limit store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use super::{RateDecision, RateLimitStore};
use formgate_common::GatewayError;

/// Rate limit entry - tracks submissions per client key
#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at: Instant,
}

/// In-memory store. The map's entry lock makes check-and-increment atomic per key.
pub struct MemoryRateLimitStore {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
}

impl MemoryRateLimitStore {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Check `key` as of `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_at: now + self.window,
            });

        // window expired? start a new one
        if now > entry.reset_at {
            entry.count = 1;
            entry.reset_at = now + self.window;
            return RateDecision::Allowed {
                remaining: self.max_requests - 1,
            };
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            return RateDecision::Allowed {
                remaining: self.max_requests - entry.count,
            };
        }

        RateDecision::Limited
    }

    /// Drop entries whose window ended before `now`; returns how many went
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.reset_at >= now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn check(&self, key: &str) -> Result<RateDecision, GatewayError> {
        Ok(self.check_at(key, Instant::now()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Background worker that evicts expired windows once per window length
pub async fn sweeper_worker(store: Arc<MemoryRateLimitStore>, mut shutdown: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(store.window());
    // first tick fires immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = store.sweep_at(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, remaining = store.len(), "Swept expired rate-limit windows");
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Rate-limit sweeper stopping");
                break;
            }
        }
    }
}
