//! reCAPTCHA v3 `siteverify` client.

use async_trait::async_trait;
use serde::Serialize;

use super::BotVerifier;
use crate::config::VerificationConfig;
use formgate_common::constants::UNKNOWN_CLIENT;
use formgate_common::{GatewayError, VerificationResult};

/// Form body of a siteverify call
#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
    #[serde(rename = "remoteip", skip_serializing_if = "Option::is_none")]
    remote_ip: Option<&'a str>,
}

pub struct RecaptchaVerifier {
    client: reqwest::Client,
    endpoint: String,
    secret: Option<String>,
}

impl RecaptchaVerifier {
    pub fn new(client: reqwest::Client, config: &VerificationConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            secret: config
                .secret
                .clone()
                .filter(|secret| !secret.trim().is_empty()),
        }
    }

    async fn call(&self, request: &VerifyRequest<'_>) -> reqwest::Result<VerificationResult> {
        self.client
            .post(&self.endpoint)
            .form(request)
            .send()
            .await?
            .error_for_status()?
            .json::<VerificationResult>()
            .await
    }
}

#[async_trait]
impl BotVerifier for RecaptchaVerifier {
    async fn verify(
        &self,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<VerificationResult, GatewayError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| GatewayError::ConfigurationMissing("RECAPTCHA_SECRET".to_string()))?;

        let request = VerifyRequest {
            secret,
            response: token,
            remote_ip: remote_ip.filter(|ip| *ip != UNKNOWN_CLIENT),
        };

        match self.call(&request).await {
            Ok(result) => {
                tracing::debug!(
                    success = result.success,
                    score = result.score,
                    action = ?result.action,
                    hostname = ?result.hostname,
                    error_codes = ?result.error_codes,
                    "reCAPTCHA verification answered"
                );
                Ok(result)
            }
            Err(e) => {
                // fail closed
                tracing::warn!(error = %e, "reCAPTCHA verification error");
                Ok(VerificationResult::failed())
            }
        }
    }

    fn is_configured(&self) -> bool {
        self.secret.is_some()
    }
}
