//! # flood-topology
//!
//! The logical graph a gossip experiment runs over: which node positions
//! exist and which may flood to which. Topologies are produced ahead of a
//! run (graph generation itself is out of scope) and are read-only input
//! here; this crate loads the JSON file, validates it, and derives the
//! per-node neighbor map the distributor pushes out.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use flood_proto::NodeId;

/// Errors raised while loading or validating a topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The topology file does not exist or cannot be read.
    #[error("topology file '{path}' could not be read: {source}")]
    Unreadable {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The topology file is not valid JSON for the expected schema.
    #[error("topology file '{path}' is malformed: {detail}")]
    Malformed {
        /// Path that was attempted.
        path: String,
        /// Parser diagnostic.
        detail: String,
    },

    /// A node id appears more than once in the node list.
    #[error("duplicate node id '{0}' in topology")]
    DuplicateNode(NodeId),

    /// An edge references a node id not present in the node list.
    #[error("edge endpoint '{0}' is not a declared node")]
    UnknownEndpoint(NodeId),
}

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// One declared node position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Logical identifier, e.g. `gossip-0`.
    pub id: NodeId,
}

/// One edge between node positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge source.
    pub source: NodeId,
    /// Edge target.
    pub target: NodeId,
    /// Optional edge weight; carried through for analysis, unused by flooding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// A complete logical topology, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// Declared node positions.
    pub nodes: Vec<NodeSpec>,
    /// Declared edges.
    pub edges: Vec<Edge>,
    /// Whether edges are one-directional.
    pub directed: bool,
}

impl Topology {
    /// Load and validate a topology from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a [`TopologyError`] if the file is missing, malformed, or
    /// fails validation. All of these are fatal configuration errors; no
    /// distribution or gossip activity may start after one.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| TopologyError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        let topology: Self =
            serde_json::from_str(&raw).map_err(|e| TopologyError::Malformed {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        topology.validate()?;
        Ok(topology)
    }

    /// Check structural invariants: unique node ids, edges only between
    /// declared nodes.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                return Err(TopologyError::DuplicateNode(node.id.clone()));
            }
        }
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint) {
                    return Err(TopologyError::UnknownEndpoint(endpoint.clone()));
                }
            }
        }
        Ok(())
    }

    /// Number of declared node positions.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Derive the per-node neighbor sets.
    ///
    /// Every declared node gets an entry, possibly empty. For each edge
    /// `(s, t)` the target joins `neighbors(s)`; undirected topologies also
    /// add the symmetric membership. Self-loops are never added, even if the
    /// file declares one.
    #[must_use]
    pub fn neighbor_map(&self) -> BTreeMap<NodeId, BTreeSet<NodeId>> {
        let mut map: BTreeMap<NodeId, BTreeSet<NodeId>> = self
            .nodes
            .iter()
            .map(|n| (n.id.clone(), BTreeSet::new()))
            .collect();

        for edge in &self.edges {
            if edge.source == edge.target {
                continue;
            }
            if let Some(neighbors) = map.get_mut(&edge.source) {
                neighbors.insert(edge.target.clone());
            }
            if !self.directed {
                if let Some(neighbors) = map.get_mut(&edge.target) {
                    neighbors.insert(edge.source.clone());
                }
            }
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn topology(edges: &[(&str, &str)], directed: bool, nodes: &[&str]) -> Topology {
        Topology {
            nodes: nodes
                .iter()
                .map(|id| NodeSpec { id: NodeId::from(*id) })
                .collect(),
            edges: edges
                .iter()
                .map(|(s, t)| Edge {
                    source: NodeId::from(*s),
                    target: NodeId::from(*t),
                    weight: None,
                })
                .collect(),
            directed,
        }
    }

    fn neighbors_of(topology: &Topology, id: &str) -> Vec<String> {
        topology.neighbor_map()[&NodeId::from(id)]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn undirected_ring_is_symmetric() {
        let t = topology(
            &[
                ("gossip-0", "gossip-1"),
                ("gossip-1", "gossip-2"),
                ("gossip-2", "gossip-3"),
                ("gossip-3", "gossip-0"),
            ],
            false,
            &["gossip-0", "gossip-1", "gossip-2", "gossip-3"],
        );
        assert_eq!(neighbors_of(&t, "gossip-0"), vec!["gossip-1", "gossip-3"]);
        assert_eq!(neighbors_of(&t, "gossip-2"), vec!["gossip-1", "gossip-3"]);
    }

    #[test]
    fn directed_edges_are_one_way() {
        let t = topology(&[("a", "b")], true, &["a", "b"]);
        assert_eq!(neighbors_of(&t, "a"), vec!["b"]);
        assert!(neighbors_of(&t, "b").is_empty());
    }

    #[test]
    fn self_loops_are_dropped() {
        let t = topology(&[("a", "a"), ("a", "b")], false, &["a", "b"]);
        assert_eq!(neighbors_of(&t, "a"), vec!["b"]);
    }

    #[test]
    fn isolated_nodes_get_empty_entries() {
        let t = topology(&[("a", "b")], false, &["a", "b", "c"]);
        assert!(neighbors_of(&t, "c").is_empty());
        assert_eq!(t.neighbor_map().len(), 3);
    }

    #[test]
    fn star_topology_centers_on_hub() {
        let t = topology(
            &[("hub", "s1"), ("hub", "s2"), ("hub", "s3")],
            false,
            &["hub", "s1", "s2", "s3"],
        );
        assert_eq!(neighbors_of(&t, "hub"), vec!["s1", "s2", "s3"]);
        assert_eq!(neighbors_of(&t, "s2"), vec!["hub"]);
    }

    #[test]
    fn duplicate_node_id_rejected() {
        let t = topology(&[], false, &["a", "a"]);
        assert!(matches!(t.validate(), Err(TopologyError::DuplicateNode(_))));
    }

    #[test]
    fn unknown_endpoint_rejected() {
        let t = topology(&[("a", "ghost")], false, &["a", "b"]);
        assert!(matches!(
            t.validate(),
            Err(TopologyError::UnknownEndpoint(id)) if id.as_str() == "ghost"
        ));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = Topology::from_file("/nonexistent/topology.json").unwrap_err();
        assert!(matches!(err, TopologyError::Unreadable { .. }));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = std::env::temp_dir().join("flood-topology-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Topology::from_file(&path).unwrap_err();
        assert!(matches!(err, TopologyError::Malformed { .. }));
    }

    #[test]
    fn file_roundtrip() {
        let dir = std::env::temp_dir().join("flood-topology-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ring.json");
        std::fs::write(
            &path,
            r#"{
                "nodes": [{"id": "gossip-0"}, {"id": "gossip-1"}],
                "edges": [{"source": "gossip-0", "target": "gossip-1", "weight": 1.0}],
                "directed": false
            }"#,
        )
        .unwrap();
        let t = Topology::from_file(&path).unwrap();
        assert_eq!(t.node_count(), 2);
        assert_eq!(t.edges[0].weight, Some(1.0));
    }

    #[test_case(true, 1; "directed counts one membership")]
    #[test_case(false, 2; "undirected counts both memberships")]
    fn membership_count_follows_directedness(directed: bool, expected: usize) {
        let t = topology(&[("a", "b")], directed, &["a", "b"]);
        let total: usize = t.neighbor_map().values().map(BTreeSet::len).sum();
        assert_eq!(total, expected);
    }
}
