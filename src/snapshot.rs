//! The external configuration snapshot handed over by the orchestration host.
//!
//! A flat, string-keyed map of scalar values. Values keep the type the host
//! reported (string, integer, float, boolean) and are coerced to their string
//! form only when an option reads them.

use std::collections::BTreeMap;

use serde::Serialize;
use toml::Value;

/// Read-only key-value view of the host's configuration at one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and callers assembling a
    /// snapshot by hand.
    pub fn with<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Parse the output of `config-get --format=json` (or `action-get`).
    ///
    /// `null` entries are treated as absent.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
        Ok(Self::from_json_map(map))
    }

    /// Build a snapshot from any serializable map or struct. Only the top
    /// level is read; nested objects and arrays are stored as their JSON text.
    pub fn from_serialize<S: Serialize>(source: &S) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(source)? {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(map)),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "expected a map at the top level, got {other}"
            ))),
        }
    }

    /// Build a snapshot from `KEY=VALUE` strings. Values are kept verbatim as
    /// strings; `007` stays `007`.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Self {
        let values = pairs
            .into_iter()
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), Value::String(v.to_string())))
            .collect();
        Self { values }
    }

    fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let values = map
            .into_iter()
            .filter_map(|(key, value)| json_to_value(value).map(|v| (key, v)))
            .collect();
        Self { values }
    }

    /// `other` layered on top of `self`; keys in `other` win.
    pub fn overlay(mut self, other: Snapshot) -> Self {
        self.values.extend(other.values);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The raw typed value, if present.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The value coerced to a string, if present.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(format_value)
    }

    /// Absent keys and empty strings both count as unset.
    pub fn is_unset(&self, key: &str) -> bool {
        self.get(key).is_none_or(|v| v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { values }
    }
}

fn json_to_value(value: serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Boolean(b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::Integer(i)),
            None => n.as_f64().map(Value::Float),
        },
        serde_json::Value::String(s) => Some(Value::String(s)),
        other => Some(Value::String(other.to_string())),
    }
}

/// Format a scalar for the INI file: strings verbatim, booleans lowercase.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}
