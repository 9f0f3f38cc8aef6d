//! Database type definitions
//!
//! Rows and parameter values are plain JSON: the connector sits between a
//! schema-less message pipeline and the database, so every value that goes
//! in or comes out is a `serde_json::Value`.

use serde_json::{Map, Value};

/// A single result row, keyed by column name
pub type Row = Map<String, Value>;

/// Shape a query result for an outbound message.
///
/// Exactly one row is unwrapped to that row; zero or several rows become an
/// array. Downstream flows depend on this asymmetry.
pub fn normalize_rows(mut rows: Vec<Row>) -> Value {
    if rows.len() == 1 {
        match rows.pop() {
            Some(row) => Value::Object(row),
            None => Value::Array(Vec::new()),
        }
    } else {
        Value::Array(rows.into_iter().map(Value::Object).collect())
    }
}

/// JSON type name, for error messages
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Text form of a parameter for drivers that bind everything as character
/// data. `None` binds SQL NULL.
pub fn param_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
