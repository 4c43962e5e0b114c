//! Service dependency topology
//!
//! The graph is a petgraph [`DiGraph`] of [`ServiceNode`]s with a name index.
//! Edges point from a dependency to its dependent (`db -> api` means `api`
//! depends on `db`), so upstream queries walk the reversed graph.
//! A graph is immutable once built; [`GraphStore`] swaps whole snapshots so
//! readers always see one complete topology.

mod chain;
mod snapshot;

pub use snapshot::{load_snapshot, save_snapshot, GraphSnapshot, SnapshotEdge, SnapshotNode};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed, Walker};
use serde::{Deserialize, Serialize};

use crate::error::{RcaError, Result};
use crate::models::ServiceDescriptor;

/// A service in the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Direct dependencies, in declaration order
    pub dependencies: Vec<String>,
}

impl ServiceNode {
    fn implicit(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
            attributes: BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }
}

/// Directed dependency graph with a name index
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ServiceNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build a graph from registry descriptors.
    ///
    /// Dependencies that are not declared as services themselves become
    /// implicit nodes. Repeated descriptors for the same name merge: the last
    /// namespace and attributes win, dependencies accumulate.
    pub fn build(services: &[ServiceDescriptor]) -> Result<Self> {
        let mut graph = Self::default();

        for service in services {
            if service.name.trim().is_empty() {
                return Err(RcaError::InvalidInput(
                    "service descriptor with empty name".to_string(),
                ));
            }
            let idx = graph.intern(&service.name);
            let node = &mut graph.graph[idx];
            if service.namespace.is_some() {
                node.namespace = service.namespace.clone();
            }
            if !service.attributes.is_empty() {
                node.attributes = service.attributes.clone();
            }
        }

        for service in services {
            let dependent = graph.index[&service.name];
            for dependency in &service.dependencies {
                if dependency.trim().is_empty() {
                    return Err(RcaError::InvalidInput(format!(
                        "service {} declares an empty dependency name",
                        service.name
                    )));
                }
                let upstream = graph.intern(dependency);
                graph.add_edge(upstream, dependent);
            }
        }

        Ok(graph)
    }

    fn intern(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(ServiceNode::implicit(name));
        self.index.insert(name.to_string(), idx);
        idx
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if self.graph.contains_edge(from, to) {
            return;
        }
        self.graph.add_edge(from, to, ());
        let dependency = self.graph[from].name.clone();
        self.graph[to].dependencies.push(dependency);
    }

    pub fn node(&self, name: &str) -> Option<&ServiceNode> {
        self.index.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &ServiceNode> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Everything `service` directly or indirectly depends on, sorted by name.
    ///
    /// Unknown services yield an empty list. The service itself is never
    /// included, even when it sits on a cycle.
    pub fn ancestors(&self, service: &str) -> Vec<String> {
        let Some(&start) = self.index.get(service) else {
            return Vec::new();
        };
        let reversed = Reversed(&self.graph);
        self.sorted_names(start, Bfs::new(reversed, start).iter(reversed))
    }

    /// Everything that directly or indirectly depends on `service`, sorted by name
    pub fn dependents(&self, service: &str) -> Vec<String> {
        let Some(&start) = self.index.get(service) else {
            return Vec::new();
        };
        self.sorted_names(start, Bfs::new(&self.graph, start).iter(&self.graph))
    }

    fn sorted_names(
        &self,
        start: NodeIndex,
        reached: impl Iterator<Item = NodeIndex>,
    ) -> Vec<String> {
        let mut names: Vec<String> = reached
            .filter(|&idx| idx != start)
            .map(|idx| self.graph[idx].name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of edges on the shortest path from `ancestor` down to `service`
    pub fn shortest_depth(&self, ancestor: &str, service: &str) -> Option<usize> {
        let target = *self.index.get(ancestor)?;
        self.upstream_depths(service)
            .into_iter()
            .find(|&(idx, _)| idx == target)
            .map(|(_, depth)| depth)
    }

    /// Hop count from `service` to every node upstream of it, excluding the
    /// service itself.
    pub(crate) fn upstream_depths(&self, service: &str) -> Vec<(NodeIndex, usize)> {
        let Some(&start) = self.index.get(service) else {
            return Vec::new();
        };
        dijkstra(Reversed(&self.graph), start, None, |_| 1usize)
            .into_iter()
            .filter(|&(idx, _)| idx != start)
            .collect()
    }
}

/// Holder of the current topology snapshot.
///
/// Readers clone the `Arc` and keep working on that snapshot even if a
/// rebuild lands in the meantime.
#[derive(Debug, Default)]
pub struct GraphStore {
    current: RwLock<Arc<DependencyGraph>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current topology snapshot
    pub fn snapshot(&self) -> Arc<DependencyGraph> {
        // The lock only guards an Arc swap, so a poisoned lock still holds a whole graph
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the topology wholesale and return the new snapshot
    pub fn build(&self, services: &[ServiceDescriptor]) -> Result<Arc<DependencyGraph>> {
        let graph = Arc::new(DependencyGraph::build(services)?);
        self.replace(graph.clone());
        Ok(graph)
    }

    pub fn replace(&self, graph: Arc<DependencyGraph>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = graph;
    }
}
