//! Google Sheets row sink using a service-account JWT grant.
//!
//! Flow per append:
//! 1. Reuse the cached access token, or sign an RS256 assertion with the
//!    service-account key and exchange it at the OAuth2 token endpoint
//! 2. POST the row to `values/{range}:append` with `RAW` input and
//!    `INSERT_ROWS` placement

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use super::RowSink;
use crate::config::SheetsConfig;
use formgate_common::GatewayError;
use formgate_common::constants::endpoints::SHEETS_SCOPE;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime; Google caps it at one hour
const ASSERTION_TTL_SECS: i64 = 3600;

/// Refresh cached tokens this long before they expire
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
enum SheetsError {
    #[error("Failed to sign service-account assertion: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),

    #[error("Token exchange failed: {0}")]
    Token(reqwest::Error),

    #[error("Append failed: {0}")]
    Append(reqwest::Error),
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_TTL_SECS
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Credentials resolved from config
struct ServiceAccount<'a> {
    email: &'a str,
    private_key: String,
    sheet_id: &'a str,
}

pub struct SheetsSink {
    client: reqwest::Client,
    config: SheetsConfig,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsSink {
    pub fn new(client: reqwest::Client, config: SheetsConfig) -> Self {
        Self {
            client,
            config,
            token: Mutex::new(None),
        }
    }

    fn service_account(&self) -> Result<ServiceAccount<'_>, GatewayError> {
        match (
            non_empty(&self.config.service_account_email),
            non_empty(&self.config.private_key),
            non_empty(&self.config.sheet_id),
        ) {
            (Some(email), Some(key), Some(sheet_id)) => Ok(ServiceAccount {
                email,
                private_key: unescape_key(key),
                sheet_id,
            }),
            _ => Err(GatewayError::ConfigurationMissing(
                "Google Sheets credentials (GOOGLE_SERVICE_ACCOUNT_EMAIL, GOOGLE_PRIVATE_KEY, GOOGLE_SHEET_ID)"
                    .to_string(),
            )),
        }
    }

    fn sign_assertion(&self, account: &ServiceAccount<'_>, now: i64) -> Result<String, SheetsError> {
        let claims = Claims {
            iss: account.email,
            scope: SHEETS_SCOPE,
            aud: &self.config.token_url,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn access_token(&self, account: &ServiceAccount<'_>) -> Result<String, SheetsError> {
        let now = chrono::Utc::now().timestamp();

        // held across the exchange so concurrent requests share one grant
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_REFRESH_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.sign_assertion(account, now)?;
        let response: TokenResponse = self
            .client
            .post(&self.config.token_url)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(SheetsError::Token)?
            .json()
            .await
            .map_err(SheetsError::Token)?;

        tracing::debug!(expires_in = response.expires_in, "Obtained Sheets access token");

        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: now + response.expires_in,
        });
        Ok(response.access_token)
    }

    async fn try_append(&self, account: &ServiceAccount<'_>, row: &[String]) -> Result<(), SheetsError> {
        let token = self.access_token(account).await?;

        self.client
            .post(append_url(&self.config.api_base, account.sheet_id, &self.config.range))
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(token)
            .json(&AppendBody { values: [row] })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(SheetsError::Append)?;

        Ok(())
    }
}

#[async_trait]
impl RowSink for SheetsSink {
    async fn append(&self, row: Vec<String>) -> Result<(), GatewayError> {
        let account = self.service_account()?;

        self.try_append(&account, &row)
            .await
            .map_err(|e| GatewayError::PersistenceFailed(e.to_string()))?;

        tracing::debug!(columns = row.len(), "Row appended to sheet");
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.config.has_credentials()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Keys pasted into env vars often carry literal `\n` instead of newlines
fn unescape_key(key: &str) -> String {
    key.replace("\\n", "\n")
}

fn append_url(api_base: &str, sheet_id: &str, range: &str) -> String {
    format!(
        "{}/v4/spreadsheets/{}/values/{}:append",
        api_base.trim_end_matches('/'),
        urlencoding::encode(sheet_id),
        urlencoding::encode(range)
    )
}
