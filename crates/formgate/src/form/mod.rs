//! Body parsing, field validation, and sanitization.

mod sanitize;
mod validate;

use sanitize::{sanitize, sanitize_token};
use validate::validate;

use serde_json::Value;

use formgate_common::{FormSchema, GatewayError, Submission};

/// Turn a raw JSON body into a sanitized submission
pub fn parse_submission(body: &[u8], schema: &FormSchema) -> Result<Submission, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(GatewayError::validation("Request body is required"));
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|_| GatewayError::validation("Invalid JSON body"))?;

    let object = match value {
        Value::Object(object) => object,
        Value::Null => return Err(GatewayError::validation("Request body is required")),
        _ => return Err(GatewayError::validation("Request body must be a JSON object")),
    };

    validate(&object, schema)?;

    let fields = schema
        .fields
        .iter()
        .map(|field| {
            let raw = object.get(&field.name).and_then(Value::as_str).unwrap_or("");
            (field.name.clone(), sanitize(raw))
        })
        .collect();

    let token = object
        .get(&schema.token_field)
        .and_then(Value::as_str)
        .map(sanitize_token)
        .unwrap_or_default();

    Ok(Submission { fields, token })
}
