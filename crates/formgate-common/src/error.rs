//! Error taxonomy for the form gateway.

use thiserror::Error;

/// Caller-facing message for every internal failure
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Every way a submission can be turned away
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// Anything but POST (or OPTIONS preflight)
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Origin header missing or not the allowed origin
    #[error("Forbidden origin")]
    ForbiddenOrigin,

    /// Body not declared as JSON
    #[error("Content-Type must be application/json")]
    BadContentType,

    /// Client exceeded its submission window
    #[error("Too many requests. Please try again later.")]
    RateLimited,

    /// Body or field rule failed
    #[error("{0}")]
    Validation(String),

    /// Verifier rejected the token, or could not be reached
    #[error("reCAPTCHA verification failed")]
    VerificationFailed,

    /// Verifier accepted the token but scored it below the threshold
    #[error("reCAPTCHA score too low")]
    VerificationScoreTooLow,

    /// A required secret or credential is not configured
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// The tabular store refused or failed the append
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// The rate-limit backend could not be queried
    #[error("Rate limit store error: {0}")]
    RateLimitStore(String),

    /// Processing ran past the request deadline
    #[error("Request timed out after {0}s")]
    TimedOut(u64),
}

impl GatewayError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MethodNotAllowed => 405,
            Self::ForbiddenOrigin => 403,
            Self::BadContentType => 400,
            Self::RateLimited => 429,
            Self::Validation(_) => 400,
            Self::VerificationFailed => 403,
            Self::VerificationScoreTooLow => 403,
            Self::ConfigurationMissing(_) => 500,
            Self::PersistenceFailed(_) => 500,
            Self::RateLimitStore(_) => 500,
            Self::TimedOut(_) => 500,
        }
    }

    /// Returns true if the detail must stay in the logs
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message safe to hand back to the caller
    pub fn public_message(&self) -> String {
        if self.is_internal() {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::MethodNotAllowed.status_code(), 405);
        assert_eq!(GatewayError::ForbiddenOrigin.status_code(), 403);
        assert_eq!(GatewayError::BadContentType.status_code(), 400);
        assert_eq!(GatewayError::RateLimited.status_code(), 429);
        assert_eq!(GatewayError::validation("x").status_code(), 400);
        assert_eq!(GatewayError::VerificationScoreTooLow.status_code(), 403);
        assert_eq!(
            GatewayError::ConfigurationMissing("RECAPTCHA_SECRET".into()).status_code(),
            500
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = GatewayError::PersistenceFailed("HTTP 403 from sheets".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = GatewayError::ConfigurationMissing("GOOGLE_PRIVATE_KEY".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = GatewayError::TimedOut(30);
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_client_errors_keep_their_message() {
        let err = GatewayError::validation("Phone must contain 7-15 digits");
        assert_eq!(err.public_message(), "Phone must contain 7-15 digits");
        assert_eq!(GatewayError::ForbiddenOrigin.public_message(), "Forbidden origin");
    }
}
