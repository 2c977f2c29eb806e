//! Parsing of untrusted reasoning-service text into a JSON object.

use serde_json::Value;

/// Outcome of parsing one response.
///
/// There is no silent fallback: a response that is not a single JSON object
/// is always `ParseFailed`, carrying the text that was received.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Ok(Value),
    ParseFailed { raw_text: String, reason: String },
}

impl ParsedResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, ParsedResponse::Ok(_))
    }
}

/// Parse a response, tolerating surrounding whitespace and a markdown code fence.
pub fn parse_response(text: &str) -> ParsedResponse {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return failed(text, "empty response");
    }

    match serde_json::from_str::<Value>(body) {
        Ok(value @ Value::Object(_)) => ParsedResponse::Ok(value),
        Ok(other) => failed(text, format!("expected a JSON object, found {}", kind(&other))),
        Err(e) => failed(text, e.to_string()),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop an optional language tag on the opening fence line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn failed(raw: &str, reason: impl Into<String>) -> ParsedResponse {
    ParsedResponse::ParseFailed {
        raw_text: raw.to_string(),
        reason: reason.into(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
