//! Field rules. The first failing rule is reported; there is no multi-error mode.

use serde_json::{Map, Value};

use formgate_common::constants::{PHONE_MAX_DIGITS, PHONE_MIN_DIGITS};
use formgate_common::{FieldKind, FieldSpec, FormSchema, GatewayError};

/// Check every schema field, then the token, in order
pub fn validate(body: &Map<String, Value>, schema: &FormSchema) -> Result<(), GatewayError> {
    for field in &schema.fields {
        validate_field(field, body.get(&field.name))?;
    }

    match body.get(&schema.token_field) {
        Some(Value::String(token)) if !token.trim().is_empty() => Ok(()),
        _ => Err(GatewayError::validation("reCAPTCHA token is required")),
    }
}

fn validate_field(field: &FieldSpec, value: Option<&Value>) -> Result<(), GatewayError> {
    let text = match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) if field.required => return Err(required(field)),
        Some(_) => {
            return Err(GatewayError::validation(format!("{} must be text", field.label)));
        }
    };

    let text = match text {
        Some(s) if !s.is_empty() => s,
        _ if field.required => return Err(required(field)),
        // optional and absent
        _ => return Ok(()),
    };

    match field.kind {
        FieldKind::Text => {
            if field.required && text.trim().is_empty() {
                return Err(required(field));
            }
        }
        FieldKind::Phone => {
            if !is_valid_phone(text) {
                return Err(GatewayError::validation(format!(
                    "{} must contain {}-{} digits",
                    field.label, PHONE_MIN_DIGITS, PHONE_MAX_DIGITS
                )));
            }
        }
        FieldKind::Email => {
            if !is_valid_email(text.trim()) {
                return Err(GatewayError::validation(format!(
                    "{} must be a valid email address",
                    field.label
                )));
            }
        }
    }

    if text.chars().count() > field.limit() {
        return Err(GatewayError::validation(format!(
            "{} must be less than {} characters",
            field.label,
            field.limit()
        )));
    }

    Ok(())
}

fn required(field: &FieldSpec) -> GatewayError {
    GatewayError::validation(format!("{} is required", field.label))
}

/// Digits left after removing whitespace, dashes and parentheses
fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !(c.is_whitespace() || matches!(c, '-' | '(' | ')')))
        .collect()
}

fn is_valid_phone(phone: &str) -> bool {
    let digits = normalize_phone(phone);
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len())
        && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Shape check only: `local@domain.tld`, no whitespace
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}
