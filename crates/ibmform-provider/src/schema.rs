//! Attribute schemas for resources and data sources
//!
//! A [`Schema`] describes the flat attribute model of one resource type:
//! which attributes exist, their types, whether the user must, may or cannot
//! set them, and which changes force the resource to be replaced.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::OnceLock;

/// Placeholder for values that are only known after apply
pub const UNKNOWN: &str = "(known after apply)";

pub fn is_unknown(value: &Value) -> bool {
    value.as_str() == Some(UNKNOWN)
}

/// Type of an attribute value
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "elem", rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int,
    Float,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    /// String to string map
    Map,
    /// Nested block, stored as a list of objects
    Block(Schema),
}

impl AttributeType {
    fn name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Int => "integer",
            AttributeType::Float => "number",
            AttributeType::Bool => "bool",
            AttributeType::List(_) => "list",
            AttributeType::Set(_) => "set",
            AttributeType::Map => "map",
            AttributeType::Block(_) => "block",
        }
    }
}

/// Value validators
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    StringLenBetween(usize, usize),
    IntBetween(i64, i64),
    OneOf(&'static [&'static str]),
    Cidr,
    /// Lowercase VPC resource names: `^([a-z]|[a-z][-a-z0-9]*[a-z0-9])$`, max 63 chars
    ResourceName,
}

fn resource_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z]|[a-z][-a-z0-9]*[a-z0-9])$").expect("valid regex"))
}

impl Validator {
    /// Returns an error message if the value is rejected
    pub fn check(&self, value: &Value) -> Option<String> {
        match self {
            Validator::StringLenBetween(min, max) => {
                let s = value.as_str()?;
                let len = s.chars().count();
                (len < *min || len > *max)
                    .then(|| format!("length must be between {} and {}, got {}", min, max, len))
            }
            Validator::IntBetween(min, max) => {
                let n = value.as_i64()?;
                (n < *min || n > *max)
                    .then(|| format!("must be between {} and {}, got {}", min, max, n))
            }
            Validator::OneOf(allowed) => {
                let s = value.as_str()?;
                (!allowed.contains(&s))
                    .then(|| format!("must be one of [{}], got '{}'", allowed.join(", "), s))
            }
            Validator::Cidr => {
                let s = value.as_str()?;
                (!is_cidr(s)).then(|| format!("'{}' is not a valid CIDR block", s))
            }
            Validator::ResourceName => {
                let s = value.as_str()?;
                if s.len() > 63 {
                    return Some(format!("'{}' is longer than 63 characters", s));
                }
                (!resource_name_regex().is_match(s)).then(|| {
                    format!(
                        "'{}' must start with a lowercase letter and contain only lowercase letters, digits and hyphens",
                        s
                    )
                })
            }
        }
    }
}

fn is_cidr(s: &str) -> bool {
    let Some((addr, prefix)) = s.split_once('/') else {
        return false;
    };
    let Ok(addr) = addr.parse::<IpAddr>() else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match addr {
        IpAddr::V4(_) => prefix <= 32,
        IpAddr::V6(_) => prefix <= 128,
    }
}

/// A single attribute definition
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    #[serde(flatten)]
    pub kind: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,
    /// Diff suppressed once the resource exists
    pub apply_once: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Attribute {
    pub fn new(kind: AttributeType) -> Self {
        Self {
            kind,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            apply_once: false,
            default: None,
            max_items: None,
            conflicts_with: Vec::new(),
            validators: Vec::new(),
            description: String::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(AttributeType::String)
    }

    pub fn int() -> Self {
        Self::new(AttributeType::Int)
    }

    pub fn float() -> Self {
        Self::new(AttributeType::Float)
    }

    pub fn bool() -> Self {
        Self::new(AttributeType::Bool)
    }

    pub fn map() -> Self {
        Self::new(AttributeType::Map)
    }

    pub fn string_list() -> Self {
        Self::new(AttributeType::List(Box::new(AttributeType::String)))
    }

    pub fn string_set() -> Self {
        Self::new(AttributeType::Set(Box::new(AttributeType::String)))
    }

    pub fn block(schema: Schema) -> Self {
        Self::new(AttributeType::Block(schema))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn apply_once(mut self) -> Self {
        self.apply_once = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn conflicts_with(mut self, keys: &[&'static str]) -> Self {
        self.conflicts_with.extend_from_slice(keys);
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the user may set this attribute in configuration
    pub fn is_configurable(&self) -> bool {
        self.required || self.optional
    }
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Validation finding for a single attribute path
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A planned change to one attribute
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
pub struct AttributeChange {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub requires_replace: bool,
}

/// Attribute schema of a resource type
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Validate user configuration against the schema
    pub fn validate(&self, config: &Map<String, Value>) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        self.validate_at("", config, &mut diags);
        diags
    }

    fn validate_at(&self, prefix: &str, config: &Map<String, Value>, diags: &mut Vec<Diagnostic>) {
        let path_of = |key: &str| {
            if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", prefix, key)
            }
        };

        for key in config.keys() {
            if key == "id" && prefix.is_empty() {
                continue;
            }
            match self.attributes.get(key) {
                None => diags.push(Diagnostic::error(path_of(key), "unsupported attribute")),
                Some(attr) if !attr.is_configurable() => diags.push(Diagnostic::error(
                    path_of(key),
                    "attribute is computed and cannot be set",
                )),
                Some(_) => {}
            }
        }

        for (key, attr) in &self.attributes {
            let path = path_of(key);
            let value = config.get(key).filter(|v| !v.is_null());

            let Some(value) = value else {
                if attr.required {
                    diags.push(Diagnostic::error(path, "required attribute is missing"));
                }
                continue;
            };

            if !attr.is_configurable() {
                continue;
            }

            for other in &attr.conflicts_with {
                if config.get(*other).is_some_and(|v| !v.is_null()) {
                    diags.push(Diagnostic::error(
                        path.clone(),
                        format!("conflicts with '{}'", path_of(other)),
                    ));
                }
            }

            check_value(&attr.kind, value, &path, diags);

            if let (Some(max), Some(items)) = (attr.max_items, value.as_array()) {
                if items.len() > max {
                    diags.push(Diagnostic::error(
                        path.clone(),
                        format!("at most {} item(s) allowed, got {}", max, items.len()),
                    ));
                }
            }

            // list and set validators apply to each element
            let targets: Vec<&Value> = match (&attr.kind, value.as_array()) {
                (AttributeType::List(_) | AttributeType::Set(_), Some(items)) => items.iter().collect(),
                _ => vec![value],
            };
            for target in targets.into_iter().filter(|v| !is_unknown(v)) {
                for validator in &attr.validators {
                    if let Some(message) = validator.check(target) {
                        diags.push(Diagnostic::error(path.clone(), message));
                    }
                }
            }
        }
    }

    /// Normalise parsed configuration into the shapes the schema expects
    pub fn coerce(&self, config: &mut Map<String, Value>) {
        for (key, attr) in &self.attributes {
            if let Some(value) = config.get_mut(key) {
                coerce_value(&attr.kind, value);
            }
        }
    }

    /// Fill in schema defaults for attributes absent from configuration
    pub fn apply_defaults(&self, config: &mut Map<String, Value>) {
        for (key, attr) in &self.attributes {
            if let Some(default) = &attr.default {
                if config.get(key).is_none_or(Value::is_null) {
                    config.insert(key.clone(), default.clone());
                }
            }
            if let AttributeType::Block(inner) = &attr.kind {
                if let Some(Value::Array(items)) = config.get_mut(key) {
                    for item in items {
                        if let Value::Object(obj) = item {
                            inner.apply_defaults(obj);
                        }
                    }
                }
            }
        }
    }

    /// Compare prior state with planned configuration
    pub fn diff(&self, prior: &Map<String, Value>, planned: &Map<String, Value>) -> Vec<AttributeChange> {
        let mut changes = Vec::new();

        for (key, attr) in &self.attributes {
            if !attr.is_configurable() {
                continue;
            }
            if attr.apply_once && !prior.is_empty() {
                continue;
            }

            let after = match planned.get(key) {
                Some(v) if !v.is_null() => Some(v),
                _ if attr.computed => continue,
                _ => attr.default.as_ref(),
            };
            // state written before an attribute gained a default reads as the default
            let before = match prior.get(key).filter(|v| !v.is_null()) {
                None if !prior.is_empty() => attr.default.as_ref(),
                before => before,
            };

            if !values_equal(&attr.kind, before, after) {
                changes.push(AttributeChange {
                    path: key.clone(),
                    before: before.cloned(),
                    after: after.cloned(),
                    requires_replace: attr.force_new && !prior.is_empty(),
                });
            }
        }

        changes
    }
}

fn check_value(kind: &AttributeType, value: &Value, path: &str, diags: &mut Vec<Diagnostic>) {
    if is_unknown(value) {
        return;
    }
    let ok = match kind {
        AttributeType::String => value.is_string(),
        AttributeType::Int => value.is_i64() || value.is_u64(),
        AttributeType::Float => value.is_number(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::Map => value
            .as_object()
            .is_some_and(|m| m.values().all(|v| v.is_string() || is_unknown(v))),
        AttributeType::List(elem) | AttributeType::Set(elem) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_value(elem, item, &format!("{}[{}]", path, i), diags);
                }
                true
            }
            None => false,
        },
        AttributeType::Block(inner) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    match item.as_object() {
                        Some(obj) => inner.validate_at(&format!("{}[{}]", path, i), obj, diags),
                        None => diags.push(Diagnostic::error(
                            format!("{}[{}]", path, i),
                            "expected a block",
                        )),
                    }
                }
                true
            }
            None => false,
        },
    };
    if !ok {
        diags.push(Diagnostic::error(
            path,
            format!("expected a {}, got {}", kind.name(), value_kind(value)),
        ));
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "block",
    }
}

fn coerce_value(kind: &AttributeType, value: &mut Value) {
    match kind {
        AttributeType::List(elem) | AttributeType::Set(elem) => {
            if !value.is_array() && !value.is_null() {
                let single = value.take();
                *value = Value::Array(vec![single]);
            }
            if let Value::Array(items) = value {
                for item in items {
                    coerce_value(elem, item);
                }
            }
        }
        AttributeType::Block(inner) => {
            if value.is_object() {
                let single = value.take();
                *value = Value::Array(vec![single]);
            }
            if let Value::Array(items) = value {
                for item in items {
                    if let Value::Object(obj) = item {
                        inner.coerce(obj);
                    }
                }
            }
        }
        AttributeType::Float => {
            if let Some(n) = value.as_i64() {
                *value = Value::from(n as f64);
            }
        }
        AttributeType::Map => {
            if let Value::Object(entries) = value {
                for entry in entries.values_mut() {
                    if entry.is_number() || entry.is_boolean() {
                        *entry = Value::String(entry.to_string());
                    }
                }
            }
        }
        _ => {}
    }
}

fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        _ => false,
    }
}

fn values_equal(kind: &AttributeType, before: Option<&Value>, after: Option<&Value>) -> bool {
    if after.is_some_and(is_unknown) {
        return false;
    }
    if is_empty_value(before) && is_empty_value(after) {
        return true;
    }
    let (Some(before), Some(after)) = (before, after) else {
        return false;
    };
    match kind {
        AttributeType::Set(_) => {
            let sorted = |v: &Value| {
                let mut items: Vec<String> = v
                    .as_array()
                    .map(|a| a.iter().map(|i| i.to_string()).collect())
                    .unwrap_or_default();
                items.sort();
                items.dedup();
                items
            };
            sorted(before) == sorted(after)
        }
        AttributeType::Block(inner) => {
            let (Some(b), Some(a)) = (before.as_array(), after.as_array()) else {
                return before == after;
            };
            b.len() == a.len()
                && b.iter().zip(a).all(|(b, a)| match (b.as_object(), a.as_object()) {
                    (Some(b), Some(a)) => block_matches(inner, b, a),
                    _ => b == a,
                })
        }
        AttributeType::Float => before.as_f64() == after.as_f64(),
        _ => before == after,
    }
}

fn block_matches(schema: &Schema, prior: &Map<String, Value>, planned: &Map<String, Value>) -> bool {
    planned.iter().all(|(key, value)| {
        let kind = schema
            .get(key)
            .map(|a| &a.kind)
            .unwrap_or(&AttributeType::String);
        values_equal(kind, prior.get(key), Some(value))
    })
}
