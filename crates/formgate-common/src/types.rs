//! Core types shared across Formgate components.

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{MAX_FIELD_CHARS, MAX_NAME_CHARS};

/// Default name of the body field carrying the bot-verification token
pub const DEFAULT_TOKEN_FIELD: &str = "recaptchaToken";

/// How a form field is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text
    #[default]
    Text,
    /// Phone number, 7-15 digits once separators are removed
    Phone,
    /// Email address, shape-checked only
    Email,
}

/// One field of the submitted form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// JSON key in the request body
    pub name: String,

    /// Human-readable name used in error messages
    pub label: String,

    #[serde(default)]
    pub kind: FieldKind,

    #[serde(default)]
    pub required: bool,

    /// Character cap; falls back to the sanitizer cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

impl FieldSpec {
    pub fn required(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            required: true,
            max_len: None,
        }
    }

    pub fn optional(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, label, kind)
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Effective character cap for this field
    pub fn limit(&self) -> usize {
        self.max_len.unwrap_or(MAX_FIELD_CHARS)
    }
}

/// Built-in field layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPreset {
    /// fullName / phone / knowledge / confirmation
    #[default]
    Consultation,
    /// name / email / phone / notes
    Contact,
}

/// Ordered field list plus the token field name.
///
/// Field order drives both validation order (first failure wins) and the
/// column order of the persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub fields: Vec<FieldSpec>,

    #[serde(default = "default_token_field")]
    pub token_field: String,
}

fn default_token_field() -> String {
    DEFAULT_TOKEN_FIELD.to_string()
}

impl FormSchema {
    pub fn preset(preset: SchemaPreset) -> Self {
        let fields = match preset {
            SchemaPreset::Consultation => vec![
                FieldSpec::required("fullName", "Full Name", FieldKind::Text)
                    .with_max_len(MAX_NAME_CHARS),
                FieldSpec::required("phone", "Phone", FieldKind::Phone),
                FieldSpec::required("knowledge", "Knowledge level", FieldKind::Text),
                FieldSpec::required(
                    "confirmation",
                    "Crypto investment confirmation",
                    FieldKind::Text,
                ),
            ],
            SchemaPreset::Contact => vec![
                FieldSpec::required("name", "Name", FieldKind::Text).with_max_len(MAX_NAME_CHARS),
                FieldSpec::required("email", "Email", FieldKind::Email).with_max_len(254),
                FieldSpec::required("phone", "Phone", FieldKind::Phone),
                FieldSpec::optional("notes", "Notes", FieldKind::Text),
            ],
        };

        Self {
            fields,
            token_field: default_token_field(),
        }
    }
}

impl Default for FormSchema {
    fn default() -> Self {
        Self::preset(SchemaPreset::default())
    }
}

/// A validated, sanitized form submission. Lives for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// (field name, sanitized value) in schema order
    pub fields: Vec<(String, String)>,

    /// Sanitized bot-verification token
    pub token: String,
}

impl Submission {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Submission time as RFC 3339 UTC with milliseconds
    pub fn timestamp_now() -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }

    /// Row to persist: timestamp first, then field values in schema order
    pub fn to_row(&self, timestamp: &str) -> Vec<String> {
        std::iter::once(timestamp.to_string())
            .chain(self.fields.iter().map(|(_, value)| value.clone()))
            .collect()
    }
}

/// Outcome of a bot-verification call, as returned by siteverify
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    #[serde(default)]
    pub success: bool,

    /// Confidence in [0, 1]; absent or null reads as 0
    #[serde(default, deserialize_with = "null_as_zero")]
    pub score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_ts: Option<String>,

    #[serde(default, rename = "error-codes", skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,
}

impl VerificationResult {
    /// Result used when the verifier could not be reached
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn passed(score: f64) -> Self {
        Self {
            success: true,
            score,
            ..Self::default()
        }
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Response body of the submission endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn success() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }
}
