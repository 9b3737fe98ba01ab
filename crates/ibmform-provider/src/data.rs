//! Attribute model passed to resource callbacks

use crate::error::{ProviderError, Result};
use crate::resource::{Operation, Timeouts};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

/// Working copy of one resource's attributes
///
/// `prior` is the last known state, `attributes` the values being planned
/// or produced by the current operation.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    prior: Map<String, Value>,
    attributes: Map<String, Value>,
    timeouts: Timeouts,
    new_resource: bool,
}

impl ResourceData {
    /// Data for a resource about to be created
    pub fn new(config: Map<String, Value>) -> Self {
        Self {
            id: String::new(),
            prior: Map::new(),
            attributes: config,
            timeouts: Timeouts::default(),
            new_resource: true,
        }
    }

    /// Data for an existing resource, as recorded in state
    pub fn from_state(id: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            prior: attributes.clone(),
            attributes,
            timeouts: Timeouts::default(),
            new_resource: false,
        }
    }

    /// Data for an update: prior state overlaid with planned values
    pub fn for_update(
        id: impl Into<String>,
        prior: Map<String, Value>,
        planned: Map<String, Value>,
    ) -> Self {
        let mut attributes = prior.clone();
        for (key, value) in planned {
            attributes.insert(key, value);
        }
        Self {
            id: id.into(),
            prior,
            attributes,
            timeouts: Timeouts::default(),
            new_resource: false,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the remote object as gone
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    pub fn timeout(&self, op: Operation) -> Duration {
        self.timeouts.get(op)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// Value if set to something other than its zero value
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|v| !is_zero(v))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get_ok(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_blocks(&self, key: &str) -> Vec<&Map<String, Value>> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default()
    }

    pub fn get_block(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get_blocks(key).into_iter().next()
    }

    /// Deserialize an attribute into a typed value
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key).ok_or_else(|| ProviderError::Attribute {
            key: key.to_string(),
            expected: "string",
        })
    }

    pub fn require_i64(&self, key: &str) -> Result<i64> {
        self.get_i64(key).ok_or_else(|| ProviderError::Attribute {
            key: key.to_string(),
            expected: "integer",
        })
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        !(equivalent(old, new))
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    /// (prior, current) values of an attribute
    pub fn get_change(&self, key: &str) -> (Option<&Value>, Option<&Value>) {
        (
            self.prior.get(key).filter(|v| !v.is_null()),
            self.attributes.get(key).filter(|v| !v.is_null()),
        )
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        _ => false,
    }
}

fn equivalent(a: Option<&Value>, b: Option<&Value>) -> bool {
    (is_empty(a) && is_empty(b)) || a == b
}
