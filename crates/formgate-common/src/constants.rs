//! Shared constants for Formgate components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Default origin allowed to submit the form
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://charityaron.vercel.app";

/// Default path of the submission endpoint
pub const DEFAULT_SUBMIT_PATH: &str = "/api/submit";

/// Accepted submissions per client within one window
pub const RATE_LIMIT_MAX: u32 = 5;

/// Rate-limit window in seconds (1 hour)
pub const RATE_LIMIT_WINDOW_SECS: u64 = 3600;

/// Minimum bot-verification score accepted as human
pub const MIN_VERIFICATION_SCORE: f64 = 0.5;

/// Maximum characters kept by the sanitizer
pub const MAX_FIELD_CHARS: usize = 1000;

/// Maximum characters of the required name field
pub const MAX_NAME_CHARS: usize = 100;

/// Accepted phone number length after normalization
pub const PHONE_MIN_DIGITS: usize = 7;
pub const PHONE_MAX_DIGITS: usize = 15;

/// Preflight cache lifetime (24 hours)
pub const CORS_MAX_AGE_SECS: u64 = 86_400;

/// Request body cap (64 KiB)
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 64 * 1024;

/// Whole-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Outbound HTTP call timeout
pub const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 10;

/// Client key used when no address can be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Upstream service endpoints
pub mod endpoints {
    /// reCAPTCHA v3 token verification
    pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

    /// Google OAuth2 token exchange
    pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

    /// Google Sheets REST API base
    pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

    /// OAuth scope for spreadsheet writes
    pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

    /// Default append range: Timestamp plus four form columns
    pub const DEFAULT_SHEET_RANGE: &str = "Sheet1!A:E";
}

/// Redis key prefixes
pub mod redis_keys {
    /// Rate limit counters: ratelimit:{client}
    pub const RATELIMIT_PREFIX: &str = "ratelimit:";
}

/// HTTP header names
pub mod headers {
    /// Proxy-supplied client address chain
    pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

    /// Proxy-supplied single client address
    pub const X_REAL_IP: &str = "x-real-ip";
}
