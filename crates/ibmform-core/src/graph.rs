//! Dependency graph between manifest nodes

use crate::error::{ManifestError, Result};
use crate::model::Manifest;
use crate::reference::references;
use ibmform_provider::GlobalState;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Address to the addresses it depends on
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    deps: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Edges from `${...}` references and `depends_on`
    ///
    /// A reference to an address the manifest does not declare is an error.
    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let mut deps = BTreeMap::new();
        for (address, node) in &manifest.nodes {
            let mut targets = BTreeSet::new();
            for reference in references(&Value::Object(node.config.clone()))? {
                if let Some(target) = reference.address() {
                    targets.insert(target.to_string());
                }
            }
            targets.extend(node.depends_on.iter().cloned());

            for target in &targets {
                if !manifest.nodes.contains_key(target) {
                    return Err(ManifestError::UnknownReference {
                        address: address.clone(),
                        target: target.clone(),
                    });
                }
            }
            deps.insert(address.clone(), targets);
        }
        Ok(Self { deps })
    }

    /// Edges recorded in state, restricted to addresses still in state
    pub fn from_state(state: &GlobalState) -> Self {
        let deps = state
            .resources
            .iter()
            .map(|(address, resource)| {
                let targets = resource
                    .dependencies
                    .iter()
                    .filter(|d| state.resources.contains_key(*d))
                    .cloned()
                    .collect();
                (address.clone(), targets)
            })
            .collect();
        Self { deps }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.deps.contains_key(address)
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, address: &str) -> Vec<String> {
        self.deps
            .get(address)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Topological order, dependencies first
    ///
    /// Ties are broken by address so the order is stable between runs.
    pub fn order(&self) -> Result<Vec<String>> {
        let mut remaining: BTreeMap<&str, usize> = self
            .deps
            .iter()
            .map(|(address, deps)| (address.as_str(), deps.len()))
            .collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (address, deps) in &self.deps {
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(address.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(address, _)| *address)
            .collect();
        let mut order = Vec::with_capacity(self.deps.len());

        while let Some(address) = ready.pop_first() {
            remaining.remove(address);
            order.push(address.to_string());
            for dependent in dependents.get(address).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }

        if !remaining.is_empty() {
            let cycle: Vec<&str> = remaining.keys().copied().collect();
            return Err(ManifestError::CircularDependency(cycle.join(", ")));
        }
        Ok(order)
    }

    /// Topological order with dependents first, for deletion
    pub fn reverse_order(&self) -> Result<Vec<String>> {
        let mut order = self.order()?;
        order.reverse();
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_manifest_str;
    use ibmform_provider::ResourceState;

    #[test]
    fn test_order_follows_references() {
        let manifest = parse_manifest_str(
            r#"
            resource "ibm_is_subnet" "a" { vpc "${ibm_is_vpc.main.id}" }
            resource "ibm_is_instance" "vm" {
                image "${data.ibm_is_image.ubuntu.id}"
                subnet "${ibm_is_subnet.a.id}"
            }
            resource "ibm_is_vpc" "main" { name "v" }
            data "ibm_is_image" "ubuntu" { name "ubuntu" }
            resource "ibm_is_ssh_key" "key" { name "k" }
            "#,
        )
        .unwrap();
        let graph = DependencyGraph::from_manifest(&manifest).unwrap();
        assert_eq!(
            graph.order().unwrap(),
            vec![
                "data.ibm_is_image.ubuntu",
                "ibm_is_ssh_key.key",
                "ibm_is_vpc.main",
                "ibm_is_subnet.a",
                "ibm_is_instance.vm",
            ]
        );
        assert_eq!(
            graph.dependencies("ibm_is_instance.vm"),
            vec!["data.ibm_is_image.ubuntu", "ibm_is_subnet.a"]
        );
        assert_eq!(graph.reverse_order().unwrap()[0], "ibm_is_instance.vm");
    }

    #[test]
    fn test_depends_on_adds_edge() {
        let manifest = parse_manifest_str(
            r#"
            resource "ibm_is_vpc" "a" { depends_on "ibm_is_vpc.b" }
            resource "ibm_is_vpc" "b" { name "b" }
            "#,
        )
        .unwrap();
        let order = DependencyGraph::from_manifest(&manifest).unwrap().order().unwrap();
        assert_eq!(order, vec!["ibm_is_vpc.b", "ibm_is_vpc.a"]);
    }

    #[test]
    fn test_cycle_names_nodes() {
        let manifest = parse_manifest_str(
            r#"
            resource "ibm_is_vpc" "a" { name "${ibm_is_vpc.b.name}" }
            resource "ibm_is_vpc" "b" { name "${ibm_is_vpc.a.name}" }
            resource "ibm_is_vpc" "c" { name "c" }
            "#,
        )
        .unwrap();
        let err = DependencyGraph::from_manifest(&manifest)
            .unwrap()
            .order()
            .unwrap_err();
        assert!(
            matches!(err, ManifestError::CircularDependency(ref nodes) if nodes == "ibm_is_vpc.a, ibm_is_vpc.b")
        );
    }

    #[test]
    fn test_undeclared_reference_is_error() {
        let manifest =
            parse_manifest_str(r#"resource "ibm_is_subnet" "a" { vpc "${ibm_is_vpc.nope.id}" }"#)
                .unwrap();
        let err = DependencyGraph::from_manifest(&manifest).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::UnknownReference { ref target, .. } if target == "ibm_is_vpc.nope"
        ));
    }

    #[test]
    fn test_graph_from_state_drops_missing_dependencies() {
        let mut state = GlobalState::new();
        state.set_resource(
            "ibm_is_subnet.a".into(),
            ResourceState::new("s-1", "ibm_is_subnet")
                .with_dependencies(vec!["ibm_is_vpc.main".into(), "ibm_is_vpc.gone".into()]),
        );
        state.set_resource("ibm_is_vpc.main".into(), ResourceState::new("v-1", "ibm_is_vpc"));
        let graph = DependencyGraph::from_state(&state);
        assert_eq!(graph.dependencies("ibm_is_subnet.a"), vec!["ibm_is_vpc.main"]);
        assert_eq!(
            graph.reverse_order().unwrap(),
            vec!["ibm_is_subnet.a", "ibm_is_vpc.main"]
        );
    }
}
