//! Application settings
//!
//! A flat string-keyed map of JSON values with a few typed accessors for the
//! keys the framework itself reads.

use serde_json::{Map, Value};

pub const ENV: &str = "env";
pub const X_POWERED_BY: &str = "x-powered-by";
pub const VIEW_ENGINE: &str = "view engine";
pub const VIEWS: &str = "views";
pub const VIEW_OPTIONS: &str = "view options";
pub const JSON_SPACES: &str = "json spaces";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`; `Value::Null` removes the key
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        match value.into() {
            Value::Null => {
                self.values.remove(key);
            }
            value => {
                self.values.insert(key.to_string(), value);
            }
        }
    }

    pub fn unset(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn enable(&mut self, key: &str) {
        self.set(key, true);
    }

    pub fn disable(&mut self, key: &str) {
        self.set(key, false);
    }

    /// Truthiness of `key`; absent keys are disabled
    pub fn enabled(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(truthy)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// `env`, defaulting to `development`
    pub fn env(&self) -> &str {
        self.get_str(ENV).unwrap_or("development")
    }

    /// Whether to send `X-Powered-By`; on unless set to a false-ish value
    pub fn x_powered_by(&self) -> bool {
        self.values.get(X_POWERED_BY).map_or(true, truthy)
    }

    /// Indent width for JSON responses, 0 for compact output
    pub fn json_spaces(&self) -> usize {
        match self.values.get(JSON_SPACES) {
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Loose boolean coercion used for feature flags
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(
            s.to_ascii_lowercase().as_str(),
            "no" | "false" | "0" | "disable"
        ),
        Value::Array(_) | Value::Object(_) => true,
    }
}
