//! `${...}` references and interpolation
//!
//! Three forms are recognised:
//!
//! - `${var.NAME}`: a manifest variable
//! - `${TYPE.NAME.ATTR}`: an attribute of a managed resource
//! - `${data.TYPE.NAME.ATTR}`: an attribute of a data source
//!
//! Further segments after `ATTR` index into nested objects and lists
//! (`${ibm_is_vpc.main.default_security_group}`,
//! `${ibm_is_lb.web.public_ips.0}`).

use crate::error::{ManifestError, Result};
use ibmform_provider::{UNKNOWN, is_unknown};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{\s*([^}]*?)\s*\}").expect("reference pattern is valid"))
}

/// A parsed reference expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Variable(String),
    Attribute { address: String, path: Vec<String> },
}

impl Reference {
    pub fn parse(expr: &str) -> Result<Self> {
        let segments: Vec<&str> = expr.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ManifestError::InvalidReference(expr.to_string()));
        }

        let (address_len, min_len) = match segments[0] {
            "var" if segments.len() == 2 => return Ok(Reference::Variable(segments[1].to_string())),
            "var" => return Err(ManifestError::InvalidReference(expr.to_string())),
            "data" => (3, 4),
            _ => (2, 3),
        };
        if segments.len() < min_len {
            return Err(ManifestError::InvalidReference(expr.to_string()));
        }

        Ok(Reference::Attribute {
            address: segments[..address_len].join("."),
            path: segments[address_len..].iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Address of the referenced node, `None` for variables
    pub fn address(&self) -> Option<&str> {
        match self {
            Reference::Variable(_) => None,
            Reference::Attribute { address, .. } => Some(address.as_str()),
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reference::Variable(name) => write!(f, "var.{}", name),
            Reference::Attribute { address, path } => write!(f, "{}.{}", address, path.join(".")),
        }
    }
}

/// Every reference inside a value, in document order
pub fn references(value: &Value) -> Result<Vec<Reference>> {
    let mut found = Vec::new();
    collect(value, &mut found)?;
    Ok(found)
}

fn collect(value: &Value, found: &mut Vec<Reference>) -> Result<()> {
    match value {
        Value::String(s) => {
            for caps in pattern().captures_iter(s) {
                found.push(Reference::parse(&caps[1])?);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, found)?;
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect(item, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Values references resolve against
///
/// Attributes of nodes that are not recorded resolve to unknown. Variables
/// must always be defined.
#[derive(Debug, Clone, Default)]
pub struct Values {
    variables: BTreeMap<String, Value>,
    nodes: BTreeMap<String, Map<String, Value>>,
}

impl Values {
    pub fn new(variables: BTreeMap<String, Value>) -> Self {
        Self {
            variables,
            nodes: BTreeMap::new(),
        }
    }

    /// Record the attributes of a node, `id` included
    pub fn insert(&mut self, address: impl Into<String>, id: &str, attributes: &Map<String, Value>) {
        let mut values = attributes.clone();
        values.insert("id".into(), Value::String(id.to_string()));
        self.nodes.insert(address.into(), values);
    }

    /// Forget a node so its attributes become unknown
    pub fn forget(&mut self, address: &str) {
        self.nodes.remove(address);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.nodes.contains_key(address)
    }

    /// Resolve one reference, `None` meaning not known yet
    pub fn resolve(&self, reference: &Reference) -> Result<Option<Value>> {
        match reference {
            Reference::Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .map(Some)
                .ok_or_else(|| ManifestError::UndefinedVariable(name.clone())),
            Reference::Attribute { address, path } => {
                let Some(attributes) = self.nodes.get(address) else {
                    return Ok(None);
                };
                let mut current = attributes.get(&path[0]);
                for segment in &path[1..] {
                    current = current.and_then(|v| match v {
                        Value::Object(map) => map.get(segment),
                        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                        _ => None,
                    });
                }
                Ok(current.filter(|v| !v.is_null() && !is_unknown(v)).cloned())
            }
        }
    }

    /// Replace every reference inside `value`
    ///
    /// A string made of exactly one reference takes the referenced value
    /// with its JSON type. References embedded in a longer string are
    /// rendered as text; if any of them is unknown the whole string is.
    pub fn interpolate(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => self.interpolate_str(s),
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|v| self.interpolate(v))
                    .collect::<Result<_>>()?,
            )),
            Value::Object(map) => Ok(Value::Object(self.interpolate_map(map)?)),
            other => Ok(other.clone()),
        }
    }

    pub fn interpolate_map(&self, map: &Map<String, Value>) -> Result<Map<String, Value>> {
        map.iter()
            .map(|(k, v)| Ok((k.clone(), self.interpolate(v)?)))
            .collect()
    }

    fn interpolate_str(&self, s: &str) -> Result<Value> {
        let re = pattern();

        if let Some(caps) = re.captures(s) {
            let whole = caps.get(0).map(|m| m.range());
            if whole == Some(0..s.len()) {
                let reference = Reference::parse(&caps[1])?;
                return Ok(self
                    .resolve(&reference)?
                    .unwrap_or_else(|| Value::String(UNKNOWN.to_string())));
            }
        }

        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        let mut unknown = false;
        for caps in re.captures_iter(s) {
            let Some(m) = caps.get(0) else { continue };
            out.push_str(&s[last..m.start()]);
            match self.resolve(&Reference::parse(&caps[1])?)? {
                Some(Value::String(text)) => out.push_str(&text),
                Some(other) => out.push_str(&other.to_string()),
                None => unknown = true,
            }
            last = m.end();
        }
        out.push_str(&s[last..]);

        if unknown {
            Ok(Value::String(UNKNOWN.to_string()))
        } else {
            Ok(Value::String(out))
        }
    }
}

/// First unknown value inside a configuration, as a dotted path
pub fn find_unknown(map: &Map<String, Value>) -> Option<String> {
    fn walk(value: &Value, path: String) -> Option<String> {
        match value {
            v if is_unknown(v) => Some(path),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, v)| walk(v, format!("{}[{}]", path, i))),
            Value::Object(map) => map
                .iter()
                .find_map(|(k, v)| walk(v, format!("{}.{}", path, k))),
            _ => None,
        }
    }
    map.iter().find_map(|(k, v)| walk(v, k.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values() -> Values {
        let mut vars = BTreeMap::new();
        vars.insert("prefix".to_string(), json!("demo"));
        vars.insert("count".to_string(), json!(3));
        let mut values = Values::new(vars);
        values.insert(
            "ibm_is_vpc.main",
            "r006-vpc",
            json!({"name": "demo-vpc", "tags": ["a", "b"], "crn": "crn:v1:vpc"})
                .as_object()
                .unwrap(),
        );
        values
    }

    #[test]
    fn test_parse_reference_forms() {
        assert_eq!(
            Reference::parse("var.prefix").unwrap(),
            Reference::Variable("prefix".into())
        );
        assert_eq!(
            Reference::parse("ibm_is_vpc.main.id").unwrap(),
            Reference::Attribute {
                address: "ibm_is_vpc.main".into(),
                path: vec!["id".into()]
            }
        );
        let data = Reference::parse("data.ibm_is_image.ubuntu.id").unwrap();
        assert_eq!(data.address(), Some("data.ibm_is_image.ubuntu"));
        assert_eq!(data.to_string(), "data.ibm_is_image.ubuntu.id");
    }

    #[test]
    fn test_parse_invalid_references() {
        assert!(Reference::parse("ibm_is_vpc.main").is_err());
        assert!(Reference::parse("data.ibm_is_image.ubuntu").is_err());
        assert!(Reference::parse("var.a.b").is_err());
        assert!(Reference::parse("ibm_is_vpc..id").is_err());
    }

    #[test]
    fn test_exact_reference_keeps_type() {
        let v = values();
        assert_eq!(v.interpolate(&json!("${var.count}")).unwrap(), json!(3));
        assert_eq!(
            v.interpolate(&json!("${ibm_is_vpc.main.tags}")).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(
            v.interpolate(&json!("${ibm_is_vpc.main.tags.1}")).unwrap(),
            json!("b")
        );
    }

    #[test]
    fn test_embedded_references_render_as_text() {
        let v = values();
        assert_eq!(
            v.interpolate(&json!("${var.prefix}-subnet-${var.count}")).unwrap(),
            json!("demo-subnet-3")
        );
        assert_eq!(
            v.interpolate(&json!({"vpc": "${ibm_is_vpc.main.id}", "names": ["${ var.prefix }"]}))
                .unwrap(),
            json!({"vpc": "r006-vpc", "names": ["demo"]})
        );
    }

    #[test]
    fn test_unknown_nodes_render_unknown() {
        let v = values();
        assert_eq!(
            v.interpolate(&json!("${ibm_is_subnet.a.id}")).unwrap(),
            json!(UNKNOWN)
        );
        assert_eq!(
            v.interpolate(&json!("prefix-${ibm_is_subnet.a.id}")).unwrap(),
            json!(UNKNOWN)
        );
        let config = v
            .interpolate_map(json!({"name": "x", "vpc": "${ibm_is_vpc.other.id}"}).as_object().unwrap())
            .unwrap();
        assert_eq!(find_unknown(&config), Some("vpc".to_string()));
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let err = values().interpolate(&json!("${var.missing}")).unwrap_err();
        assert!(matches!(err, ManifestError::UndefinedVariable(name) if name == "missing"));
    }

    #[test]
    fn test_collect_references() {
        let refs = references(&json!({
            "a": "${var.prefix}",
            "b": ["${ibm_is_vpc.main.id}", "plain"],
        }))
        .unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].address(), Some("ibm_is_vpc.main"));
    }
}
