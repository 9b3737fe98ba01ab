//! Catalog of resource and data source types

use crate::error::{ProviderError, Result};
use crate::resource::{DataSource, Resource};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resource and data source types keyed by type name
#[derive(Default, Clone)]
pub struct Registry {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) {
        let name = resource.type_name();
        if self.resources.insert(name, resource).is_some() {
            tracing::warn!("Resource type {} registered twice", name);
        }
    }

    pub fn register_data_source(&mut self, data_source: Arc<dyn DataSource>) {
        let name = data_source.type_name();
        if self.data_sources.insert(name, data_source).is_some() {
            tracing::warn!("Data source {} registered twice", name);
        }
    }

    pub fn with_resource(mut self, resource: impl Resource + 'static) -> Self {
        self.register_resource(Arc::new(resource));
        self
    }

    pub fn with_data_source(mut self, data_source: impl DataSource + 'static) -> Self {
        self.register_data_source(Arc::new(data_source));
        self
    }

    pub fn resource(&self, type_name: &str) -> Result<Arc<dyn Resource>> {
        self.resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| ProviderError::ResourceTypeNotFound(type_name.to_string()))
    }

    pub fn data_source(&self, type_name: &str) -> Result<Arc<dyn DataSource>> {
        self.data_sources
            .get(type_name)
            .cloned()
            .ok_or_else(|| ProviderError::DataSourceNotFound(type_name.to_string()))
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    pub fn data_source_types(&self) -> Vec<&'static str> {
        self.data_sources.keys().copied().collect()
    }

    /// JSON description of every registered schema
    pub fn schema_document(&self) -> Result<Value> {
        let mut resources = Map::new();
        for (name, resource) in &self.resources {
            let mut entry = Map::new();
            entry.insert("attributes".into(), serde_json::to_value(resource.schema())?);
            entry.insert("timeouts".into(), serde_json::to_value(resource.timeouts())?);
            resources.insert(name.to_string(), Value::Object(entry));
        }

        let mut data_sources = Map::new();
        for (name, ds) in &self.data_sources {
            data_sources.insert(
                name.to_string(),
                json!({ "attributes": serde_json::to_value(ds.schema())? }),
            );
        }

        Ok(json!({
            "resources": resources,
            "data_sources": data_sources,
        }))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.resource_types())
            .field("data_sources", &self.data_source_types())
            .finish()
    }
}
