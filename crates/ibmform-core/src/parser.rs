//! KDL manifest parser
//!
//! Top-level nodes:
//!
//! ```kdl
//! provider "ibm" { region "us-south" }
//! variable "prefix" "demo"
//! resource "ibm_is_vpc" "main" { name "${var.prefix}-vpc" }
//! data "ibm_is_image" "ubuntu" { name "ibm-ubuntu-22-04-minimal-amd64-1" }
//! ```
//!
//! Inside a body, a child with one argument is a scalar, several arguments
//! a list, and properties or children an object. Repeating a child name
//! collects the values into a list, which is how multiple blocks are
//! written.

use crate::error::{ManifestError, Result};
use crate::model::{Manifest, Node, NodeKind, ProviderBlock};
use crate::reference::Values;
use kdl::{KdlDocument, KdlNode, KdlValue};
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::Path;

/// Environment prefix overriding variable values (`IBMFORM_VAR_prefix=prod`)
pub const VAR_ENV_PREFIX: &str = "IBMFORM_VAR_";

const PROVIDER_NAME: &str = "ibm";

/// Parse a manifest file
pub fn parse_manifest_file<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| ManifestError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!("Parsing manifest {}", path.display());
    parse_manifest_str(&content)
}

/// Parse manifest text
pub fn parse_manifest_str(content: &str) -> Result<Manifest> {
    let doc: KdlDocument = content.parse()?;
    let mut manifest = Manifest::default();
    let mut declared_variables = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "provider" => {
                let provider = parse_provider(node)?;
                if manifest.provider.is_some() {
                    return Err(ManifestError::DuplicateAddress(format!("provider.{}", provider.name)));
                }
                manifest.provider = Some(provider);
            }
            "variable" => {
                let (name, value) = parse_variable(node)?;
                if manifest.variables.contains_key(&name) || declared_variables.contains(&name) {
                    return Err(ManifestError::DuplicateAddress(format!("var.{}", name)));
                }
                match value {
                    Some(value) => {
                        manifest.variables.insert(name, value);
                    }
                    None => declared_variables.push(name),
                }
            }
            "resource" => insert_node(&mut manifest, parse_node(node, NodeKind::Resource)?)?,
            "data" => insert_node(&mut manifest, parse_node(node, NodeKind::Data)?)?,
            other => tracing::warn!("Ignoring unknown top-level node '{}'", other),
        }
    }

    apply_env_variables(&mut manifest, &declared_variables)?;
    resolve_provider_settings(&mut manifest)?;

    tracing::debug!(
        "Parsed {} variables and {} nodes",
        manifest.variables.len(),
        manifest.nodes.len()
    );
    Ok(manifest)
}

fn insert_node(manifest: &mut Manifest, node: Node) -> Result<()> {
    let address = node.address();
    if manifest.nodes.contains_key(&address) {
        return Err(ManifestError::DuplicateAddress(address));
    }
    manifest.nodes.insert(address, node);
    Ok(())
}

/// Positional string argument `index` of a node
fn string_arg<'a>(node: &'a KdlNode, index: usize, what: &str) -> Result<&'a str> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .nth(index)
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| {
            ManifestError::InvalidManifest(format!("{} requires {}", node.name().value(), what))
        })
}

fn parse_provider(node: &KdlNode) -> Result<ProviderBlock> {
    let name = string_arg(node, 0, "a provider name")?;
    if name != PROVIDER_NAME {
        return Err(ManifestError::UnknownProvider(name.to_string()));
    }
    let mut settings = Map::new();
    if let Some(children) = node.children() {
        body_into(children, &mut settings)?;
    }
    Ok(ProviderBlock {
        name: name.to_string(),
        settings,
    })
}

/// `variable "name" VALUE` or `variable "name" { default VALUE }`
fn parse_variable(node: &KdlNode) -> Result<(String, Option<Value>)> {
    let name = string_arg(node, 0, "a variable name")?.to_string();

    let inline = node
        .entries()
        .iter()
        .filter(|e| e.name().is_none())
        .nth(1)
        .map(|e| kdl_value(e.value()))
        .transpose()?;
    if inline.is_some() {
        return Ok((name, inline));
    }

    let mut body = Map::new();
    if let Some(children) = node.children() {
        body_into(children, &mut body)?;
    }
    Ok((name, body.remove("default")))
}

fn parse_node(node: &KdlNode, kind: NodeKind) -> Result<Node> {
    let resource_type = string_arg(node, 0, "a type and a name")?;
    let name = string_arg(node, 1, "a type and a name")?;
    let mut parsed = Node::new(kind, resource_type, name);

    let Some(children) = node.children() else {
        return Ok(parsed);
    };
    for child in children.nodes() {
        match child.name().value() {
            "timeouts" => match node_value(child)? {
                Value::Object(timeouts) => parsed.timeouts = timeouts,
                _ => {
                    return Err(ManifestError::InvalidManifest(format!(
                        "{}: timeouts must be a block",
                        parsed.address()
                    )));
                }
            },
            "depends_on" => {
                for entry in child.entries() {
                    let target = entry.value().as_string().ok_or_else(|| {
                        ManifestError::InvalidManifest(format!(
                            "{}: depends_on takes addresses",
                            parsed.address()
                        ))
                    })?;
                    parsed.depends_on.push(target.to_string());
                }
            }
            key => {
                let value = node_value(child)?;
                merge_into(&mut parsed.config, key, value);
            }
        }
    }
    Ok(parsed)
}

fn body_into(doc: &KdlDocument, map: &mut Map<String, Value>) -> Result<()> {
    for child in doc.nodes() {
        let value = node_value(child)?;
        merge_into(map, child.name().value(), value);
    }
    Ok(())
}

/// Repeated keys collect into a list
fn merge_into(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(Value::Array(items)) if value.is_object() => items.push(value),
        Some(existing) => {
            let mut items = match existing.take() {
                Value::Array(items) => items,
                single => vec![single],
            };
            match value {
                Value::Array(more) => items.extend(more),
                single => items.push(single),
            }
            *existing = Value::Array(items);
        }
    }
}

fn node_value(node: &KdlNode) -> Result<Value> {
    let mut args = Vec::new();
    let mut object = Map::new();
    for entry in node.entries() {
        let value = kdl_value(entry.value())?;
        match entry.name() {
            Some(key) => {
                object.insert(key.value().to_string(), value);
            }
            None => args.push(value),
        }
    }

    if let Some(children) = node.children() {
        body_into(children, &mut object)?;
    } else if object.is_empty() {
        return match args.len() {
            0 => Err(ManifestError::InvalidManifest(format!(
                "'{}' has no value",
                node.name().value()
            ))),
            1 => Ok(args.remove(0)),
            _ => Ok(Value::Array(args)),
        };
    }

    if !args.is_empty() {
        return Err(ManifestError::InvalidManifest(format!(
            "'{}' mixes arguments with a block",
            node.name().value()
        )));
    }
    Ok(Value::Object(object))
}

fn kdl_value(value: &KdlValue) -> Result<Value> {
    if let Some(s) = value.as_string() {
        return Ok(Value::String(s.to_string()));
    }
    if let Some(i) = value.as_integer() {
        return i64::try_from(i)
            .map(Value::from)
            .map_err(|_| ManifestError::InvalidManifest(format!("integer {} is out of range", i)));
    }
    if let Some(f) = value.as_float() {
        return Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| ManifestError::InvalidManifest(format!("number {} is not finite", f)));
    }
    if let Some(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    Ok(Value::Null)
}

/// Environment overrides for declared variables
fn apply_env_variables(manifest: &mut Manifest, declared: &[String]) -> Result<()> {
    let names: Vec<String> = manifest
        .variables
        .keys()
        .cloned()
        .chain(declared.iter().cloned())
        .collect();

    for name in names {
        if let Ok(raw) = std::env::var(format!("{}{}", VAR_ENV_PREFIX, name)) {
            // numbers and booleans keep their type
            let value = serde_json::from_str::<Value>(&raw)
                .ok()
                .filter(|v| v.is_number() || v.is_boolean())
                .unwrap_or(Value::String(raw));
            tracing::debug!("Variable {} set from environment", name);
            manifest.variables.insert(name, value);
        } else if !manifest.variables.contains_key(&name) {
            return Err(ManifestError::UndefinedVariable(name));
        }
    }
    Ok(())
}

/// Provider settings may use variables but not resource attributes
fn resolve_provider_settings(manifest: &mut Manifest) -> Result<()> {
    let Some(provider) = manifest.provider.as_mut() else {
        return Ok(());
    };
    for reference in crate::reference::references(&Value::Object(provider.settings.clone()))? {
        if let Some(address) = reference.address() {
            return Err(ManifestError::InvalidManifest(format!(
                "provider settings cannot reference {}",
                address
            )));
        }
    }
    let values = Values::new(manifest.variables.clone());
    provider.settings = values.interpolate_map(&provider.settings)?;
    Ok(())
}

#[cfg(test)]
mod tests;
