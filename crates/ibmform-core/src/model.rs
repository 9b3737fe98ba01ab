//! Manifest model

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Provider settings from the `provider "ibm"` block
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderBlock {
    pub name: String,
    pub settings: Map<String, Value>,
}

impl ProviderBlock {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }
}

/// Whether a node is a managed resource or a read-only data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Resource,
    Data,
}

/// A `resource` or `data` declaration
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub resource_type: String,
    pub name: String,
    /// Attribute values, possibly containing `${...}` references
    pub config: Map<String, Value>,
    /// `timeouts { create "20m" }` overrides
    pub timeouts: Map<String, Value>,
    /// Explicit `depends_on` addresses
    pub depends_on: Vec<String>,
}

impl Node {
    pub fn new(kind: NodeKind, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            resource_type: resource_type.into(),
            name: name.into(),
            config: Map::new(),
            timeouts: Map::new(),
            depends_on: Vec::new(),
        }
    }

    /// `type.name` for resources, `data.type.name` for data sources
    pub fn address(&self) -> String {
        address(self.kind, &self.resource_type, &self.name)
    }

    pub fn is_data(&self) -> bool {
        self.kind == NodeKind::Data
    }
}

pub fn address(kind: NodeKind, resource_type: &str, name: &str) -> String {
    match kind {
        NodeKind::Resource => format!("{}.{}", resource_type, name),
        NodeKind::Data => format!("data.{}.{}", resource_type, name),
    }
}

/// A parsed manifest
#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    pub provider: Option<ProviderBlock>,
    pub variables: BTreeMap<String, Value>,
    /// Declarations keyed by address
    pub nodes: BTreeMap<String, Node>,
}

impl Manifest {
    pub fn node(&self, address: &str) -> Option<&Node> {
        self.nodes.get(address)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| !n.is_data())
    }

    pub fn data_sources(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.is_data())
    }
}
