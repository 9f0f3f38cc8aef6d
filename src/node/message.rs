//! Pipeline messages
//!
//! A message is a schema-less JSON object carrying at least `payload`.
//! Every key the pipeline attached is preserved when the message is
//! forwarded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An inbound or outbound pipeline message
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(Map<String, Value>);

impl Message {
    /// A message with only a payload
    pub fn new(payload: Value) -> Self {
        let mut fields = Map::new();
        fields.insert("payload".to_string(), payload);
        Self(fields)
    }

    /// Wrap an arbitrary JSON value; non-objects become the payload
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            other => Self::new(other),
        }
    }

    /// The payload, `None` if the message has none
    pub fn payload(&self) -> Option<&Value> {
        self.0.get("payload")
    }

    pub fn set_payload(&mut self, payload: Value) {
        self.0.insert("payload".to_string(), payload);
    }

    /// The error attached by a previous node, if any
    pub fn error(&self) -> Option<&Value> {
        self.0.get("error")
    }

    pub fn set_error(&mut self, error: Value) {
        self.0.insert("error".to_string(), error);
    }

    /// Look up a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Borrow the message as a JSON object
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}
