//! Textual scrubbing of user input before it is stored.
//!
//! This is not an HTML sanitizer. It removes the characters and patterns
//! that let stored text turn into markup or script when a spreadsheet cell
//! is later rendered somewhere careless:
//! - `<` and `>`
//! - `javascript:` scheme prefixes (any case)
//! - inline handler attributes such as `onerror=` (any case)

use regex::Regex;
use std::sync::LazyLock;

use formgate_common::constants::MAX_FIELD_CHARS;

static SCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid scheme pattern"));

/// `on<word>=` with an ASCII word, as in `onerror=`
static INLINE_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on[a-z0-9_]+=").expect("valid handler pattern"));

/// Sanitize a field value, keeping at most 1000 characters
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, Some(MAX_FIELD_CHARS))
}

/// Sanitize a verification token. Same stripping, no truncation, since real
/// tokens run past the field cap.
pub fn sanitize_token(input: &str) -> String {
    sanitize_with_limit(input, None)
}

fn sanitize_with_limit(input: &str, limit: Option<usize>) -> String {
    let stripped: String = input.trim().chars().filter(|c| !matches!(c, '<' | '>')).collect();
    let stripped = SCRIPT_SCHEME.replace_all(&stripped, "");
    let stripped = INLINE_HANDLER.replace_all(&stripped, "");

    match limit {
        Some(limit) => stripped.chars().take(limit).collect(),
        None => stripped.into_owned(),
    }
}
