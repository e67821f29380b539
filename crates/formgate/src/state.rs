//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, RateLimitBackend};
use crate::persist::{RowSink, SheetsSink};
use crate::ratelimit::{MemoryRateLimitStore, RateLimitStore, RedisRateLimitStore};
use crate::verify::{BotVerifier, RecaptchaVerifier};
use formgate_common::FormSchema;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Field layout resolved from config
    pub schema: Arc<FormSchema>,

    /// Per-client submission counters
    pub rate_limiter: Arc<dyn RateLimitStore>,

    /// Bot-verification service
    pub verifier: Arc<dyn BotVerifier>,

    /// Tabular store for accepted submissions
    pub sink: Arc<dyn RowSink>,

    /// Set when the in-process limiter is active, so its sweeper can run
    pub memory_limiter: Option<Arc<MemoryRateLimitStore>>,
}

impl AppState {
    /// Build state with the configured backends
    pub async fn new(config: AppConfig) -> Result<Self> {
        let mut memory_limiter = None;
        let rate_limiter: Arc<dyn RateLimitStore> = match config.rate_limit.backend {
            RateLimitBackend::Memory => {
                let store = Arc::new(MemoryRateLimitStore::new(
                    config.rate_limit.max_requests,
                    config.rate_limit.window(),
                ));
                memory_limiter = Some(store.clone());
                store
            }
            RateLimitBackend::Redis => {
                let url = config
                    .rate_limit
                    .redis_url
                    .as_deref()
                    .context("Redis rate limiting needs a redis_url")?;
                Arc::new(
                    RedisRateLimitStore::connect(
                        url,
                        config.rate_limit.max_requests,
                        config.rate_limit.window(),
                    )
                    .await?,
                )
            }
        };

        let verifier = Arc::new(RecaptchaVerifier::new(
            http_client(config.verification.timeout_secs)?,
            &config.verification,
        ));
        let sink = Arc::new(SheetsSink::new(
            http_client(config.sheets.timeout_secs)?,
            config.sheets.clone(),
        ));

        Ok(Self {
            memory_limiter,
            ..Self::with_parts(config, rate_limiter, verifier, sink)
        })
    }

    /// Assemble state from explicit collaborators
    pub fn with_parts(
        config: AppConfig,
        rate_limiter: Arc<dyn RateLimitStore>,
        verifier: Arc<dyn BotVerifier>,
        sink: Arc<dyn RowSink>,
    ) -> Self {
        let schema = Arc::new(config.form.schema());
        Self {
            config: Arc::new(config),
            schema,
            rate_limiter,
            verifier,
            sink,
            memory_limiter: None,
        }
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("formgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
