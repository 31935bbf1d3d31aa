//! Decoding of the frontend's stored `hassTokens` value.
//!
//! Depending on the bridge, the value reaches us as a JSON object, as the
//! JSON string the frontend stored, or as that string encoded once more.

use serde_json::Value;

const ACCESS_TOKEN_FIELD: &str = "access_token";

/// Why a stored value did not yield a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParseFailure {
    Malformed(String),
    MissingField,
}

/// Extract `access_token` from the stored credential.
pub(crate) fn parse_stored_token(raw: &Value) -> Result<String, ParseFailure> {
    match raw {
        Value::Object(_) => access_token(raw),
        Value::String(text) => parse_text(text),
        other => Err(ParseFailure::Malformed(format!(
            "unexpected stored value type: {}",
            type_name(other)
        ))),
    }
}

fn parse_text(text: &str) -> Result<String, ParseFailure> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => access_token(&Value::Object(map)),
        // Double-encoded: the outer layer decodes to the inner JSON string.
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(value @ Value::Object(_)) => access_token(&value),
            Ok(other) => Err(ParseFailure::Malformed(format!(
                "double-encoded value is a {}",
                type_name(&other)
            ))),
            Err(e) => Err(ParseFailure::Malformed(e.to_string())),
        },
        Ok(other) => Err(ParseFailure::Malformed(format!(
            "stored value is a {}",
            type_name(&other)
        ))),
        Err(first) => unquote(text)
            .and_then(|inner| serde_json::from_str::<Value>(&inner).ok())
            .filter(Value::is_object)
            .map(|value| access_token(&value))
            .unwrap_or_else(|| Err(ParseFailure::Malformed(first.to_string()))),
    }
}

/// Strip one layer of surrounding quotes and `\"` escapes that were not
/// valid JSON on their own.
fn unquote(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed);

    if !inner.contains("\\\"") {
        return None;
    }

    Some(inner.replace("\\\"", "\"").replace("\\\\", "\\"))
}

fn access_token(value: &Value) -> Result<String, ParseFailure> {
    value
        .get(ACCESS_TOKEN_FIELD)
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(ParseFailure::MissingField)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
