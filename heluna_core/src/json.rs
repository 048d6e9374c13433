//! Conversion between the value model and JSON text
//!
//! Nothing maps to `null` in both directions. Object key order is kept.

use serde_json::Value as Json;

use crate::error::{HelunaError, Result};
use crate::value::{List, Record, Value};

/// Build a value from parsed JSON
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Nothing,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(items.iter().map(from_json).collect::<List>()),
        Json::Object(fields) => Value::Record(
            fields
                .iter()
                .map(|(k, v)| (k.as_str(), from_json(v)))
                .collect::<Record>(),
        ),
    }
}

/// Parse JSON text into a value
pub fn parse(text: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(text)?;
    Ok(from_json(&json))
}

/// Parse JSON text that must hold an object at top level
pub fn parse_record(text: &str) -> Result<Record> {
    match parse(text)? {
        Value::Record(rec) => Ok(rec),
        other => Err(HelunaError::Type(format!(
            "input must be a JSON object, got: {}",
            other.type_name()
        ))),
    }
}

/// Serialize a value to compact JSON text
pub fn to_string(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
