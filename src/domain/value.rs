//! Conversion between the stored string form of a toggle value and its typed JSON form.
//!
//! The same [`decode`] serves the cache-fill path and direct reads, so a cached response
//! and an uncached one are byte-identical.

use serde_json::{Number, Value};
use tracing::warn;

use crate::domain::{error::DomainError, types::ValueType};

/// Decode a stored value according to its declared type.
///
/// Decoding never fails: a value that does not parse under its declared type falls back
/// to the raw string.
pub fn decode(raw: &str, value_type: ValueType) -> Value {
    match value_type {
        ValueType::String => Value::String(raw.to_string()),
        ValueType::Number => parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string())),
        ValueType::Boolean => Value::Bool(raw == "true"),
        ValueType::Json => match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    target = "toggleboard::domain::value",
                    error = %err,
                    "stored JSON value failed to parse; serving raw string"
                );
                Value::String(raw.to_string())
            }
        },
    }
}

/// Encode a typed value into its stored string form.
pub fn encode(value: &Value, value_type: ValueType) -> String {
    match (value_type, value) {
        (ValueType::String, Value::String(text)) => text.clone(),
        (ValueType::Number, Value::Number(number)) => number.to_string(),
        (ValueType::Boolean, Value::Bool(flag)) => flag.to_string(),
        (ValueType::Json, other) => other.to_string(),
        (_, Value::String(text)) => text.clone(),
        (_, other) => other.to_string(),
    }
}

/// Reject stored values that would not decode under their declared type.
pub fn validate(raw: &str, value_type: ValueType) -> Result<(), DomainError> {
    if raw.trim().is_empty() {
        return Err(DomainError::field("value", "value is required"));
    }

    match value_type {
        ValueType::String => Ok(()),
        ValueType::Number => parse_number(raw)
            .map(|_| ())
            .ok_or_else(|| DomainError::field("value", "value must be a valid number")),
        ValueType::Boolean => match raw {
            "true" | "false" => Ok(()),
            _ => Err(DomainError::field(
                "value",
                "boolean value must be \"true\" or \"false\"",
            )),
        },
        ValueType::Json => serde_json::from_str::<Value>(raw)
            .map(|_| ())
            .map_err(|err| DomainError::field("value", format!("value must be valid JSON: {err}"))),
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
