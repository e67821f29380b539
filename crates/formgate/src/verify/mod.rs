//! Bot verification: is this submission from a human?

mod recaptcha;

pub use recaptcha::RecaptchaVerifier;

use async_trait::async_trait;
use formgate_common::{GatewayError, VerificationResult};

/// A bot-scoring service
#[async_trait]
pub trait BotVerifier: Send + Sync {
    /// Score `token`. Transport failures come back as a failed result, not
    /// an error; only missing configuration is an error.
    async fn verify(
        &self,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<VerificationResult, GatewayError>;

    /// Whether the verifier has the secret it needs
    fn is_configured(&self) -> bool;
}

/// Accept or reject a verification result
pub fn evaluate(result: &VerificationResult, min_score: f64) -> Result<(), GatewayError> {
    if !result.success {
        return Err(GatewayError::VerificationFailed);
    }
    if result.score < min_score {
        return Err(GatewayError::VerificationScoreTooLow);
    }
    Ok(())
}
