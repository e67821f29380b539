//! Configuration management for Formgate.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use formgate_common::constants::{
    DEFAULT_ALLOWED_ORIGIN, DEFAULT_BODY_LIMIT_BYTES, DEFAULT_LISTEN_ADDR,
    DEFAULT_OUTBOUND_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SUBMIT_PATH,
    MIN_VERIFICATION_SCORE, RATE_LIMIT_MAX, RATE_LIMIT_WINDOW_SECS, endpoints,
};
use formgate_common::{FieldSpec, FormSchema, SchemaPreset};

/// Prefix for nested environment overrides, e.g. `FORMGATE__RATE_LIMIT__MAX_REQUESTS`
const ENV_PREFIX: &str = "FORMGATE";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listen address
    pub listen_addr: String,

    /// The one origin allowed to submit
    pub allowed_origin: String,

    /// Path of the submission endpoint
    pub submit_path: String,

    /// Largest accepted request body
    pub body_limit_bytes: usize,

    /// Whole-request timeout
    pub request_timeout_secs: u64,

    pub rate_limit: RateLimitConfig,

    pub verification: VerificationConfig,

    pub sheets: SheetsConfig,

    pub form: FormConfig,
}

/// Where rate-limit counters live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// Shared Redis, for multi-instance deployments
    Redis,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Accepted submissions per client per window
    pub max_requests: u32,

    /// Fixed window length in seconds
    pub window_secs: u64,

    pub backend: RateLimitBackend,

    /// Redis connection URL (required for the redis backend)
    pub redis_url: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: RATE_LIMIT_MAX,
            window_secs: RATE_LIMIT_WINDOW_SECS,
            backend: RateLimitBackend::Memory,
            redis_url: None,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Bot verification configuration
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// reCAPTCHA secret key
    pub secret: Option<String>,

    /// siteverify endpoint
    pub endpoint: String,

    /// Scores below this are rejected
    pub min_score: f64,

    pub timeout_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            secret: None,
            endpoint: endpoints::RECAPTCHA_VERIFY_URL.to_string(),
            min_score: MIN_VERIFICATION_SCORE,
            timeout_secs: DEFAULT_OUTBOUND_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for VerificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("min_score", &self.min_score)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Spreadsheet persistence configuration
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub service_account_email: Option<String>,

    /// PEM private key; literal `\n` sequences are accepted
    pub private_key: Option<String>,

    pub sheet_id: Option<String>,

    /// A1 range rows are appended to
    pub range: String,

    pub token_url: String,

    pub api_base: String,

    pub timeout_secs: u64,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            service_account_email: None,
            private_key: None,
            sheet_id: None,
            range: endpoints::DEFAULT_SHEET_RANGE.to_string(),
            token_url: endpoints::GOOGLE_TOKEN_URL.to_string(),
            api_base: endpoints::SHEETS_API_BASE.to_string(),
            timeout_secs: DEFAULT_OUTBOUND_TIMEOUT_SECS,
        }
    }
}

impl SheetsConfig {
    /// True when email, key and sheet id are all present
    pub fn has_credentials(&self) -> bool {
        [&self.service_account_email, &self.private_key, &self.sheet_id]
            .iter()
            .all(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

impl fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("service_account_email", &self.service_account_email)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("sheet_id", &self.sheet_id)
            .field("range", &self.range)
            .field("token_url", &self.token_url)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Form field layout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Built-in layout used when `fields` is absent
    pub preset: SchemaPreset,

    /// Body key of the verification token
    pub token_field: Option<String>,

    /// Explicit field list, overrides the preset
    pub fields: Option<Vec<FieldSpec>>,
}

impl FormConfig {
    pub fn schema(&self) -> FormSchema {
        let mut schema = match &self.fields {
            Some(fields) => FormSchema {
                fields: fields.clone(),
                ..FormSchema::preset(self.preset)
            },
            None => FormSchema::preset(self.preset),
        };
        if let Some(token_field) = &self.token_field {
            schema.token_field = token_field.clone();
        }
        schema
    }
}

impl AppConfig {
    /// Load configuration from file and `FORMGATE__*` env, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut builder = config::Config::builder();
        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let mut config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load config")?
            .try_deserialize()
            .context("Failed to parse config")?;

        config.apply_overrides(args);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI flags and their well-known env fallbacks
    fn apply_overrides(&mut self, args: &super::Args) {
        if let Some(ref listen) = args.listen {
            self.listen_addr = listen.clone();
        }
        if let Some(ref origin) = args.allowed_origin {
            self.allowed_origin = origin.clone();
        }
        if let Some(ref redis_url) = args.redis_url {
            self.rate_limit.redis_url = Some(redis_url.clone());
            self.rate_limit.backend = RateLimitBackend::Redis;
        }
        if let Some(ref secret) = args.recaptcha_secret {
            self.verification.secret = Some(secret.clone());
        }
        if let Some(ref email) = args.google_service_account_email {
            self.sheets.service_account_email = Some(email.clone());
        }
        if let Some(ref key) = args.google_private_key {
            self.sheets.private_key = Some(key.clone());
        }
        if let Some(ref sheet_id) = args.google_sheet_id {
            self.sheets.sheet_id = Some(sheet_id.clone());
        }
    }

    /// Reject settings the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.allowed_origin)
            .with_context(|| format!("allowed_origin is not a URL: {}", self.allowed_origin))?;

        if !(0.0..=1.0).contains(&self.verification.min_score) {
            bail!("verification.min_score must be within [0, 1]");
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            bail!("rate_limit.max_requests and rate_limit.window_secs must be positive");
        }
        if self.rate_limit.backend == RateLimitBackend::Redis && self.rate_limit.redis_url.is_none() {
            bail!("rate_limit.backend = \"redis\" requires rate_limit.redis_url");
        }
        if !self.submit_path.starts_with('/') {
            bail!("submit_path must start with '/'");
        }
        if self.form.schema().fields.is_empty() {
            bail!("form schema has no fields");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            submit_path: DEFAULT_SUBMIT_PATH.to_string(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            rate_limit: RateLimitConfig::default(),
            verification: VerificationConfig::default(),
            sheets: SheetsConfig::default(),
            form: FormConfig::default(),
        }
    }
}
