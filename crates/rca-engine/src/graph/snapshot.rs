//! Node/edge list persistence for warm restarts
//!
//! Snapshots are written as JSON wrapped in an envelope carrying a SHA-256
//! checksum of the graph payload. Loading verifies the checksum before the
//! graph is handed back for a rebuild.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use super::DependencyGraph;
use crate::error::{RcaError, Result};
use crate::models::ServiceDescriptor;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Edge from a dependency to its dependent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub from: String,
    pub to: String,
}

/// Serializable node/edge form of a [`DependencyGraph`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    checksum: String,
    graph: GraphSnapshot,
}

impl DependencyGraph {
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .map(|node| SnapshotNode {
                name: node.name.clone(),
                namespace: node.namespace.clone(),
                attributes: node.attributes.clone(),
            })
            .collect();

        // Grouped by dependent, in dependency declaration order, so a rebuild
        // reproduces every node's dependency list exactly
        let edges = self
            .nodes()
            .flat_map(|node| {
                node.dependencies.iter().map(|dependency| SnapshotEdge {
                    from: dependency.clone(),
                    to: node.name.clone(),
                })
            })
            .collect();

        GraphSnapshot {
            version: SNAPSHOT_VERSION,
            nodes,
            edges,
        }
    }
}

impl GraphSnapshot {
    /// Turn the snapshot back into registry descriptors, preserving node order
    pub fn into_descriptors(self) -> Result<Vec<ServiceDescriptor>> {
        if self.version != SNAPSHOT_VERSION {
            return Err(RcaError::SnapshotVersion(self.version));
        }

        let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for edge in self.edges {
            dependencies.entry(edge.to).or_default().push(edge.from);
        }

        Ok(self
            .nodes
            .into_iter()
            .map(|node| ServiceDescriptor {
                dependencies: dependencies.remove(&node.name).unwrap_or_default(),
                name: node.name,
                namespace: node.namespace,
                attributes: node.attributes,
            })
            .collect())
    }

    /// Hex-encoded SHA-256 of the canonical JSON encoding
    pub fn checksum(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// Write a graph snapshot to `path`, replacing any previous file
pub fn save_snapshot(graph: &DependencyGraph, path: &Path) -> Result<()> {
    let graph = graph.to_snapshot();
    let file = SnapshotFile {
        checksum: graph.checksum()?,
        graph,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| RcaError::io(parent, e))?;

    // Each writer gets its own sibling temp file; the rename is atomic, so
    // concurrent saves never expose a torn snapshot
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| RcaError::io(parent, e))?;
    serde_json::to_writer_pretty(&mut tmp, &file)?;
    tmp.flush().map_err(|e| RcaError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| RcaError::io(path, e.error))?;

    debug!(
        path = %path.display(),
        nodes = file.graph.nodes.len(),
        edges = file.graph.edges.len(),
        "Wrote topology snapshot"
    );
    Ok(())
}

/// Read and verify a snapshot written by [`save_snapshot`]
pub fn load_snapshot(path: &Path) -> Result<GraphSnapshot> {
    let content = fs::read(path).map_err(|e| RcaError::io(path, e))?;
    let file: SnapshotFile = serde_json::from_slice(&content)?;

    let actual = file.graph.checksum()?;
    if actual != file.checksum {
        return Err(RcaError::SnapshotChecksum {
            path: path.to_path_buf(),
            expected: file.checksum,
            actual,
        });
    }

    Ok(file.graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn topology() -> Vec<ServiceDescriptor> {
        let mut gateway = ServiceDescriptor::new("gateway")
            .in_namespace("edge")
            .depends_on(["checkout", "search"]);
        gateway
            .attributes
            .insert("tier".to_string(), serde_json::json!("frontend"));

        vec![
            gateway,
            ServiceDescriptor::new("checkout")
                .in_namespace("shop")
                .depends_on(["payments", "postgres"]),
            ServiceDescriptor::new("payments").depends_on(["postgres", "ledger"]),
            ServiceDescriptor::new("search").depends_on(["elastic"]),
            // cycle between two workers
            ServiceDescriptor::new("worker-a").depends_on(["worker-b"]),
            ServiceDescriptor::new("worker-b").depends_on(["worker-a", "postgres"]),
        ]
    }

    #[test]
    fn test_round_trip_preserves_ancestors_for_every_node() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");

        let original = DependencyGraph::build(&topology()).unwrap();
        save_snapshot(&original, &path).unwrap();

        let restored =
            DependencyGraph::build(&load_snapshot(&path).unwrap().into_descriptors().unwrap())
                .unwrap();

        assert_eq!(original.node_count(), restored.node_count());
        assert_eq!(original.edge_count(), restored.edge_count());
        for node in original.nodes() {
            assert_eq!(
                original.ancestors(&node.name),
                restored.ancestors(&node.name),
                "ancestors differ for {}",
                node.name
            );
            assert_eq!(Some(node), restored.node(&node.name));
        }
        assert_eq!(original.to_snapshot(), restored.to_snapshot());
    }

    #[test]
    fn test_tampered_snapshot_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        save_snapshot(&DependencyGraph::build(&topology()).unwrap(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        fs::write(&path, content.replace("\"ledger\"", "\"ledger-v2\"")).unwrap();

        assert!(matches!(
            load_snapshot(&path),
            Err(RcaError::SnapshotChecksum { .. })
        ));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut snapshot = DependencyGraph::build(&topology()).unwrap().to_snapshot();
        snapshot.version = 99;
        assert!(matches!(
            snapshot.into_descriptors(),
            Err(RcaError::SnapshotVersion(99))
        ));
    }

    #[test]
    fn test_concurrent_saves_leave_a_valid_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        let graphs: Vec<_> = (0..8)
            .map(|i| {
                let mut services = topology();
                services.push(ServiceDescriptor::new(format!("extra-{i}")));
                DependencyGraph::build(&services).unwrap()
            })
            .collect();

        std::thread::scope(|scope| {
            for graph in &graphs {
                let path = &path;
                scope.spawn(move || save_snapshot(graph, path).unwrap());
            }
        });

        let restored = load_snapshot(&path).unwrap();
        assert_eq!(restored.nodes.len(), graphs[0].node_count());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("graph.json")]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = load_snapshot(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(RcaError::Io { .. })));
    }
}
