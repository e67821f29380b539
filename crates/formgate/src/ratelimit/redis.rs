//! Redis-backed rate-limit store shared across gateway instances.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::time::Duration;

use super::{RateDecision, RateLimitStore};
use formgate_common::GatewayError;
use formgate_common::constants::redis_keys::RATELIMIT_PREFIX;

/// Fixed-window check-and-increment, atomic on the Redis side.
///
/// Returns the new count, or -1 when the window is full.
const CHECK_SCRIPT: &str = r"
local count = redis.call('GET', KEYS[1])
if not count then
    redis.call('SET', KEYS[1], 1, 'PX', ARGV[2])
    return 1
end
if tonumber(count) >= tonumber(ARGV[1]) then
    return -1
end
return redis.call('INCR', KEYS[1])
";

pub struct RedisRateLimitStore {
    /// Connection manager (auto-reconnecting)
    redis: ConnectionManager,
    script: redis::Script,
    max_requests: u32,
    window: Duration,
}

impl RedisRateLimitStore {
    pub async fn connect(redis_url: &str, max_requests: u32, window: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let redis = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            redis,
            script: redis::Script::new(CHECK_SCRIPT),
            max_requests,
            window,
        })
    }

    /// Redis key for a client; urlencoded to keep it free of separators
    fn key_for(client: &str) -> String {
        format!("{}{}", RATELIMIT_PREFIX, urlencoding::encode(client))
    }
}

/// Map the script's reply onto a decision
fn decide(max_requests: u32, count: i64) -> RateDecision {
    if count < 0 {
        return RateDecision::Limited;
    }
    let used = u32::try_from(count).unwrap_or(u32::MAX);
    RateDecision::Allowed {
        remaining: max_requests.saturating_sub(used),
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn check(&self, key: &str) -> Result<RateDecision, GatewayError> {
        let mut conn = self.redis.clone();
        let window_ms = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX);

        let count: i64 = self
            .script
            .key(Self::key_for(key))
            .arg(self.max_requests)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| GatewayError::RateLimitStore(e.to_string()))?;

        Ok(decide(self.max_requests, count))
    }

    async fn ping(&self) -> bool {
        let mut conn = self.redis.clone();
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
