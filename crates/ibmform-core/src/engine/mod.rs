//! Plan, apply, destroy and import
//!
//! The engine drives [`Resource`](ibmform_provider::Resource) and
//! [`DataSource`](ibmform_provider::DataSource) implementations from a
//! [`Manifest`] and keeps the state file in sync after every action.

use crate::error::{ManifestError, Result};
use crate::graph::DependencyGraph;
use crate::model::{Manifest, Node};
use crate::reference::{Values, find_unknown};
use ibmform_provider::{
    Action, ActionType, ApplyResult, Diagnostic, GlobalState, Operation, Plan, ProviderError,
    Registry, Resource, ResourceData, ResourceState, ResourceStatus, Schema, StateLock,
    StateManager, Timeouts,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::Instant;

/// Added to an operation's timeout when extending the state lock
const LEASE_MARGIN: Duration = Duration::from_secs(10 * 60);

pub struct Engine {
    registry: Registry,
    state: StateManager,
}

impl Engine {
    pub fn new(registry: Registry, state: StateManager) -> Self {
        Self { registry, state }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn load_state(&self) -> Result<GlobalState> {
        Ok(self.state.load().await?)
    }

    /// Check every declaration without calling any API
    ///
    /// Graph errors (undeclared references, cycles) are returned as `Err`;
    /// per-node problems are collected as diagnostics prefixed with the
    /// node address.
    pub fn validate(&self, manifest: &Manifest) -> Result<Vec<Diagnostic>> {
        DependencyGraph::from_manifest(manifest)?.order()?;
        let values = Values::new(manifest.variables.clone());
        let mut diagnostics = Vec::new();

        for (address, node) in &manifest.nodes {
            let schema = match self.schema_of(node) {
                Ok(schema) => schema,
                Err(e) => {
                    diagnostics.push(Diagnostic::error(address.as_str(), e.to_string()));
                    continue;
                }
            };

            let mut config = values.interpolate_map(&node.config)?;
            schema.coerce(&mut config);
            diagnostics.extend(schema.validate(&config).into_iter().map(|d| Diagnostic {
                path: format!("{}.{}", address, d.path),
                ..d
            }));

            if !node.is_data() && !node.timeouts.is_empty() {
                let resource = self.registry.resource(&node.resource_type)?;
                if let Err(e) = resource.timeouts().with_overrides(&node.timeouts) {
                    diagnostics.push(Diagnostic::error(format!("{}.timeouts", address), e.to_string()));
                }
            }
        }
        Ok(diagnostics)
    }

    /// Re-read every resource in state, dropping those that no longer exist
    ///
    /// Returns the addresses that were dropped.
    pub async fn refresh(&self, state: &mut GlobalState) -> Result<Vec<String>> {
        let mut gone = Vec::new();
        let addresses: Vec<String> = state.resources.keys().cloned().collect();

        for address in addresses {
            let Some(mut entry) = state.get_resource(&address).cloned() else {
                continue;
            };
            let resource = self.registry.resource(&entry.resource_type)?;
            let mut d = ResourceData::from_state(entry.id.as_str(), entry.attributes.clone())
                .with_timeouts(resource.timeouts());
            resource.read(&mut d).await?;

            if d.id().is_empty() {
                tracing::warn!("{} no longer exists, removing from state", address);
                state.remove_resource(&address);
                gone.push(address);
            } else {
                tracing::debug!("Refreshed {}", address);
                entry.id = d.id().to_string();
                entry.set_attributes(d.into_attributes());
                state.set_resource(address, entry);
            }
        }
        Ok(gone)
    }

    /// Compute the actions that bring state in line with the manifest
    ///
    /// Data sources whose configuration is fully known are read here and
    /// the result travels with the plan; the rest are read during apply.
    pub async fn plan(&self, manifest: &Manifest, state: &GlobalState) -> Result<Plan> {
        let order = DependencyGraph::from_manifest(manifest)?.order()?;
        let mut values = Values::new(manifest.variables.clone());
        let mut actions = self.plan_deletes(manifest, state)?;

        for address in order {
            let Some(node) = manifest.node(&address) else {
                continue;
            };
            let (schema, config) = self.prepare(node, &values)?;

            if node.is_data() {
                let mut action = Action::new(address.as_str(), ActionType::Read, node.resource_type.as_str());
                if find_unknown(&config).is_none() {
                    let data_source = self.registry.data_source(&node.resource_type)?;
                    let mut d = ResourceData::new(config);
                    data_source.read(&mut d).await?;
                    values.insert(address.as_str(), d.id(), d.attributes());
                    action = action.with_read_result(d.id(), d.attributes());
                } else {
                    tracing::debug!("Deferring read of {} until apply", address);
                }
                actions.push(action);
                continue;
            }

            let action = match state.get_resource(&address) {
                None => Action::new(address.as_str(), ActionType::Create, node.resource_type.as_str())
                    .with_changes(schema.diff(&Map::new(), &config)),
                Some(existing) => {
                    let changes = schema.diff(&existing.attributes, &config);
                    let action_type = if existing.status == ResourceStatus::Tainted
                        || changes.iter().any(|c| c.requires_replace)
                    {
                        ActionType::Replace
                    } else if changes.is_empty() {
                        ActionType::NoOp
                    } else {
                        ActionType::Update
                    };
                    match action_type {
                        ActionType::NoOp => values.insert(address.as_str(), &existing.id, &existing.attributes),
                        ActionType::Update => values.insert(
                            address.as_str(),
                            &existing.id,
                            &after_update(&existing.attributes, &config),
                        ),
                        _ => {}
                    }
                    Action::new(address.as_str(), action_type, node.resource_type.as_str())
                        .with_id(existing.id.as_str())
                        .with_changes(changes)
                }
            };
            tracing::debug!("Planned {}", action.description);
            actions.push(action);
        }

        Ok(Plan::new(actions))
    }

    /// Deletions for state entries the manifest no longer declares
    fn plan_deletes(&self, manifest: &Manifest, state: &GlobalState) -> Result<Vec<Action>> {
        Ok(DependencyGraph::from_state(state)
            .reverse_order()?
            .into_iter()
            .filter(|address| manifest.node(address).is_none())
            .filter_map(|address| {
                state.get_resource(&address).map(|r| {
                    Action::new(address.as_str(), ActionType::Delete, r.resource_type.as_str())
                        .with_id(r.id.as_str())
                })
            })
            .collect())
    }

    /// Take the project lock; mutating operations require it
    pub async fn lock(&self) -> Result<StateLock> {
        Ok(self.state.acquire_lock().await?)
    }

    fn check_lock(&self, lock: &StateLock) -> Result<()> {
        if self.state.holds(lock) {
            Ok(())
        } else {
            Err(ProviderError::LockError("the lock does not guard this project's state".into()).into())
        }
    }

    /// Execute a plan
    ///
    /// Deletions run first: removed declarations and the old objects of
    /// replaced resources, dependents before what they depend on. Creates
    /// and updates follow in plan order. State is saved after every
    /// action. A failed action is recorded in the result and every action
    /// depending on it is skipped.
    pub async fn apply(
        &self,
        manifest: &Manifest,
        plan: &Plan,
        state: &mut GlobalState,
        lock: &mut StateLock,
    ) -> Result<ApplyResult> {
        self.check_lock(lock)?;
        let started = Instant::now();
        let graph = DependencyGraph::from_manifest(manifest)?;
        let mut values = Values::new(manifest.variables.clone());
        for (address, entry) in &state.resources {
            values.insert(address.as_str(), &entry.id, &entry.attributes);
        }

        let mut result = ApplyResult::new();
        let outgoing: BTreeMap<&str, ActionType> = plan
            .actions
            .iter()
            .filter(|a| matches!(a.action_type, ActionType::Delete | ActionType::Replace))
            .map(|a| (a.address.as_str(), a.action_type))
            .collect();
        let mut broken = self
            .delete_outgoing(manifest, &outgoing, state, lock, &mut values, &mut result)
            .await?;

        for action in &plan.actions {
            let address = &action.address;
            if action.action_type == ActionType::Delete || broken.contains(address) {
                continue;
            }
            if graph.dependencies(address).iter().any(|d| broken.contains(d)) {
                tracing::warn!("Skipping {}: a dependency failed", address);
                result.add_skipped(address.clone());
                broken.insert(address.clone());
                continue;
            }

            match self.apply_action(manifest, action, &graph, &mut values, state, lock).await {
                Ok(Some(message)) => {
                    tracing::info!("{}: {}", address, message);
                    result.add_success(address.clone(), message);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("{} failed: {}", action.description, e);
                    result.add_failure(address.clone(), e.to_string());
                    broken.insert(address.clone());
                }
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Delete every address in `outgoing` in reverse dependency order
    ///
    /// Returns the addresses that could not be deleted. When a deletion
    /// fails, the objects it depends on are kept. Only plain deletions are
    /// reported as successes; a replacement reports once re-created.
    async fn delete_outgoing(
        &self,
        manifest: &Manifest,
        outgoing: &BTreeMap<&str, ActionType>,
        state: &mut GlobalState,
        lock: &mut StateLock,
        values: &mut Values,
        result: &mut ApplyResult,
    ) -> Result<BTreeSet<String>> {
        let graph = DependencyGraph::from_state(state);
        let mut kept: BTreeSet<String> = BTreeSet::new();
        let mut broken = BTreeSet::new();

        for address in graph.reverse_order()? {
            let Some(action_type) = outgoing.get(address.as_str()) else {
                continue;
            };
            if kept.contains(&address) {
                tracing::warn!("Keeping {}: a dependent could not be destroyed", address);
                kept.extend(graph.dependencies(&address));
                result.add_skipped(address.clone());
                broken.insert(address);
                continue;
            }

            match self.delete_address(manifest, &address, state, lock).await {
                Ok(()) => {
                    values.forget(&address);
                    if *action_type == ActionType::Delete {
                        result.add_success(address, "destroyed".into());
                    }
                }
                Err(e) => {
                    tracing::error!("Destroying {} failed: {}", address, e);
                    kept.extend(graph.dependencies(&address));
                    result.add_failure(address.clone(), e.to_string());
                    broken.insert(address);
                }
            }
        }
        Ok(broken)
    }

    async fn apply_action(
        &self,
        manifest: &Manifest,
        action: &Action,
        graph: &DependencyGraph,
        values: &mut Values,
        state: &mut GlobalState,
        lock: &mut StateLock,
    ) -> Result<Option<String>> {
        let address = action.address.as_str();
        match action.action_type {
            ActionType::NoOp | ActionType::Delete => Ok(None),
            ActionType::Read => {
                if let Some(read) = &action.read_result {
                    let id = read.get("id").and_then(Value::as_str).unwrap_or_default();
                    values.insert(address, id, read);
                    return Ok(Some("read".into()));
                }
                let node = declared(manifest, address)?;
                let (_, config) = self.prepare(node, values)?;
                ensure_known(address, &config)?;
                let data_source = self.registry.data_source(&node.resource_type)?;
                let mut d = ResourceData::new(config);
                data_source.read(&mut d).await?;
                values.insert(address, d.id(), d.attributes());
                Ok(Some("read".into()))
            }
            ActionType::Create => {
                let node = declared(manifest, address)?;
                let id = self.create(node, graph, values, state, lock).await?;
                Ok(Some(format!("created ({})", id)))
            }
            ActionType::Replace => {
                // the old object went in the deletion pass
                let node = declared(manifest, address)?;
                let id = self.create(node, graph, values, state, lock).await?;
                Ok(Some(format!("replaced ({})", id)))
            }
            ActionType::Update => {
                let node = declared(manifest, address)?;
                self.update(node, graph, values, state, lock).await?;
                Ok(Some("updated".into()))
            }
        }
    }

    async fn create(
        &self,
        node: &Node,
        graph: &DependencyGraph,
        values: &mut Values,
        state: &mut GlobalState,
        lock: &mut StateLock,
    ) -> Result<String> {
        let address = node.address();
        let resource = self.registry.resource(&node.resource_type)?;
        let (_, config) = self.prepare(node, values)?;
        ensure_known(&address, &config)?;

        let timeouts = timeouts_for(resource.as_ref(), node)?;
        lock.extend(timeouts.get(Operation::Create) + LEASE_MARGIN).await?;
        let mut d = ResourceData::new(config).with_timeouts(timeouts);
        tracing::info!("Creating {}", address);

        if let Err(e) = resource.create(&mut d).await {
            // the object exists remotely but did not finish; replace it next time
            if !d.id().is_empty() {
                let entry = ResourceState::new(d.id(), node.resource_type.as_str())
                    .with_status(ResourceStatus::Tainted)
                    .with_attributes(d.into_attributes())
                    .with_dependencies(graph.dependencies(&address));
                state.set_resource(address.clone(), entry);
                self.state.save(state).await?;
            }
            return Err(e.into());
        }
        if d.id().is_empty() {
            return Err(ProviderError::api(format!("{} was created but has no id", address)).into());
        }

        let id = d.id().to_string();
        let attributes = d.into_attributes();
        values.insert(address.as_str(), &id, &attributes);
        let entry = ResourceState::new(id.as_str(), node.resource_type.as_str())
            .with_status(ResourceStatus::Ready)
            .with_attributes(attributes)
            .with_dependencies(graph.dependencies(&address));
        state.set_resource(address, entry);
        self.state.save(state).await?;
        Ok(id)
    }

    async fn update(
        &self,
        node: &Node,
        graph: &DependencyGraph,
        values: &mut Values,
        state: &mut GlobalState,
        lock: &mut StateLock,
    ) -> Result<()> {
        let address = node.address();
        let resource = self.registry.resource(&node.resource_type)?;
        let (schema, mut config) = self.prepare(node, values)?;
        ensure_known(&address, &config)?;
        let mut entry = state
            .get_resource(&address)
            .cloned()
            .ok_or_else(|| ProviderError::ResourceNotFound(address.clone()))?;

        // attributes removed from the manifest are sent as unset
        for change in schema.diff(&entry.attributes, &config) {
            if change.after.is_none() {
                config.insert(change.path, Value::Null);
            }
        }

        let timeouts = timeouts_for(resource.as_ref(), node)?;
        lock.extend(timeouts.get(Operation::Update) + LEASE_MARGIN).await?;
        let mut d = ResourceData::for_update(entry.id.as_str(), entry.attributes.clone(), config)
            .with_timeouts(timeouts);
        tracing::info!("Updating {}", address);
        resource.update(&mut d).await?;

        if d.id().is_empty() {
            state.remove_resource(&address);
            self.state.save(state).await?;
            return Err(ProviderError::ResourceNotFound(address).into());
        }

        entry.id = d.id().to_string();
        entry.status = ResourceStatus::Ready;
        entry.dependencies = graph.dependencies(&address);
        entry.set_attributes(d.into_attributes());
        values.insert(address.as_str(), &entry.id, &entry.attributes);
        state.set_resource(address, entry);
        self.state.save(state).await?;
        Ok(())
    }

    /// Delete one object recorded in state
    ///
    /// Delete timeouts come from the manifest when the address is still
    /// declared there.
    async fn delete_address(
        &self,
        manifest: &Manifest,
        address: &str,
        state: &mut GlobalState,
        lock: &mut StateLock,
    ) -> Result<()> {
        let Some(entry) = state.get_resource(address).cloned() else {
            return Ok(());
        };
        let resource = self.registry.resource(&entry.resource_type)?;
        let timeouts = match manifest.node(address) {
            Some(node) => timeouts_for(resource.as_ref(), node)?,
            None => resource.timeouts(),
        };
        lock.extend(timeouts.get(Operation::Delete) + LEASE_MARGIN).await?;

        let mut d = ResourceData::from_state(entry.id.as_str(), entry.attributes).with_timeouts(timeouts);
        tracing::info!("Destroying {} ({})", address, entry.id);
        resource.delete(&mut d).await?;

        state.remove_resource(address);
        self.state.save(state).await?;
        Ok(())
    }

    /// Plan deleting everything in state, dependents first
    pub fn plan_destroy(&self, state: &GlobalState) -> Result<Plan> {
        let actions = DependencyGraph::from_state(state)
            .reverse_order()?
            .into_iter()
            .filter_map(|address| {
                state.get_resource(&address).map(|r| {
                    Action::new(address.as_str(), ActionType::Delete, r.resource_type.as_str())
                        .with_id(r.id.as_str())
                })
            })
            .collect();
        Ok(Plan::new(actions))
    }

    /// Delete every resource in state, dependents first
    ///
    /// When a deletion fails, the resources it depends on are kept.
    pub async fn destroy(
        &self,
        manifest: &Manifest,
        state: &mut GlobalState,
        lock: &mut StateLock,
    ) -> Result<ApplyResult> {
        self.check_lock(lock)?;
        let started = Instant::now();
        let addresses: Vec<String> = state.resources.keys().cloned().collect();
        let outgoing: BTreeMap<&str, ActionType> = addresses
            .iter()
            .map(|address| (address.as_str(), ActionType::Delete))
            .collect();

        let mut result = ApplyResult::new();
        self.delete_outgoing(manifest, &outgoing, state, lock, &mut Values::default(), &mut result)
            .await?;
        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Bring an existing remote object under management
    pub async fn import(
        &self,
        manifest: &Manifest,
        address: &str,
        id: &str,
        state: &mut GlobalState,
        lock: &mut StateLock,
    ) -> Result<ResourceState> {
        self.check_lock(lock)?;
        let node = manifest
            .node(address)
            .filter(|n| !n.is_data())
            .ok_or_else(|| ManifestError::NotDeclared(address.to_string()))?;
        if state.get_resource(address).is_some() {
            return Err(ManifestError::AlreadyManaged(address.to_string()));
        }
        let graph = DependencyGraph::from_manifest(manifest)?;
        let resource = self.registry.resource(&node.resource_type)?;
        let timeouts = timeouts_for(resource.as_ref(), node)?;
        lock.extend(timeouts.get(Operation::Read) + LEASE_MARGIN).await?;

        let mut d = resource.import(id).await?.with_timeouts(timeouts);
        resource.read(&mut d).await?;
        if d.id().is_empty() {
            return Err(ProviderError::ResourceNotFound(format!("{} {}", node.resource_type, id)).into());
        }

        let entry = ResourceState::new(d.id(), node.resource_type.as_str())
            .with_status(ResourceStatus::Ready)
            .with_attributes(d.into_attributes())
            .with_dependencies(graph.dependencies(address));
        state.set_resource(address.to_string(), entry.clone());
        self.state.save(state).await?;
        tracing::info!("Imported {} as {}", id, address);
        Ok(entry)
    }

    fn schema_of(&self, node: &Node) -> Result<Schema> {
        Ok(if node.is_data() {
            self.registry.data_source(&node.resource_type)?.schema()
        } else {
            self.registry.resource(&node.resource_type)?.schema()
        })
    }

    /// Interpolated, coerced and defaulted configuration of a node
    fn prepare(&self, node: &Node, values: &Values) -> Result<(Schema, Map<String, Value>)> {
        let schema = self.schema_of(node)?;
        let mut config = values.interpolate_map(&node.config)?;
        schema.coerce(&mut config);
        schema.apply_defaults(&mut config);

        let errors: Vec<Diagnostic> = schema
            .validate(&config)
            .into_iter()
            .filter(Diagnostic::is_error)
            .collect();
        if !errors.is_empty() {
            return Err(ManifestError::Invalid {
                address: node.address(),
                diagnostics: errors,
            });
        }
        Ok((schema, config))
    }
}

fn declared<'a>(manifest: &'a Manifest, address: &str) -> Result<&'a Node> {
    manifest
        .node(address)
        .ok_or_else(|| ManifestError::NotDeclared(address.to_string()))
}

fn ensure_known(address: &str, config: &Map<String, Value>) -> Result<()> {
    match find_unknown(config) {
        Some(attribute) => Err(ManifestError::UnresolvedValue {
            address: address.to_string(),
            attribute,
        }),
        None => Ok(()),
    }
}

/// What a resource is expected to look like after an in-place update
///
/// Planned configuration replaces the prior values it sets. Unknown planned
/// values stay unknown so dependents plan a change too.
fn after_update(prior: &Map<String, Value>, config: &Map<String, Value>) -> Map<String, Value> {
    let mut after = prior.clone();
    for (key, value) in config {
        after.insert(key.clone(), value.clone());
    }
    after
}

fn timeouts_for(resource: &dyn Resource, node: &Node) -> Result<Timeouts> {
    Ok(resource.timeouts().with_overrides(&node.timeouts)?)
}
