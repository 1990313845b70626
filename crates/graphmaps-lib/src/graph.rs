use std::collections::{BTreeMap, HashMap};
#[cfg(test)]
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coords::Coordinates;
use crate::error::{Error, Result};
use crate::raw::{effective_maxspeed, RawGraph};

/// Road-network node identifier. Opaque apart from equality.
pub type NodeId = i64;

/// Directed edge identifier: `(from, to)`.
///
/// Parallel raw edges between the same ordered pair collapse into one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId {
    pub from: NodeId,
    pub to: NodeId,
}

impl EdgeId {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }
}

impl From<(NodeId, NodeId)> for EdgeId {
    fn from((from, to): (NodeId, NodeId)) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.from, self.to)
    }
}

/// Graph node with its derived outgoing adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub next_nodes: Vec<NodeId>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Node {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Directed edge with the only attributes routing needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    /// Length in metres.
    pub length: f64,
    /// Effective speed limit in km/h.
    pub maxspeed: i64,
}

/// Compact road graph: authoritative edges plus positioned nodes.
///
/// Every edge endpoint is a key of `nodes`, and every `next_nodes` entry of a
/// node has a matching edge keyed `(node, entry)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: HashMap<NodeId, Node>,
    pub edges: HashMap<EdgeId, Edge>,
}

impl Graph {
    /// Convert a raw multigraph into the compact model.
    ///
    /// Raw edges are visited once, in order. A later parallel edge replaces an
    /// earlier one for the same ordered pair. Edges whose endpoints are not
    /// raw nodes are dropped so the result stays closed.
    pub fn from_raw(raw: &RawGraph) -> Self {
        let positions: HashMap<NodeId, (f64, f64)> = raw
            .nodes
            .iter()
            .map(|node| (node.id, (node.latitude, node.longitude)))
            .collect();

        let mut edges: HashMap<EdgeId, Edge> = HashMap::with_capacity(raw.edges.len());
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut dropped = 0usize;

        for raw_edge in &raw.edges {
            if !positions.contains_key(&raw_edge.from) || !positions.contains_key(&raw_edge.to) {
                dropped += 1;
                continue;
            }

            let id = EdgeId::new(raw_edge.from, raw_edge.to);
            let edge = Edge {
                id,
                length: raw_edge.length,
                maxspeed: effective_maxspeed(raw_edge.maxspeed.as_ref()),
            };
            if edges.insert(id, edge).is_none() {
                adjacency.entry(id.from).or_default().push(id.to);
            }
        }

        if dropped > 0 {
            warn!(dropped, "raw edges referenced unknown nodes and were skipped");
        }

        let nodes = positions
            .into_iter()
            .map(|(id, (latitude, longitude))| {
                let node = Node {
                    id,
                    next_nodes: adjacency.remove(&id).unwrap_or_default(),
                    latitude,
                    longitude,
                };
                (id, node)
            })
            .collect::<HashMap<_, _>>();

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            raw_edges = raw.edges.len(),
            "converted raw network"
        );

        Self { nodes, edges }
    }

    /// Assemble a graph from decoded node positions and edges, deriving the
    /// adjacency lists. Fails when an edge endpoint has no node.
    ///
    /// Adjacency comes out in ascending [`EdgeId`] order, so it can differ in
    /// order, never in content, from a graph built by [`Graph::from_raw`].
    pub fn from_parts(
        positions: BTreeMap<NodeId, (f64, f64)>,
        edges: BTreeMap<EdgeId, Edge>,
    ) -> Result<Self> {
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for id in edges.keys() {
            for endpoint in [id.from, id.to] {
                if !positions.contains_key(&endpoint) {
                    return Err(Error::corrupt(
                        "edges",
                        format!("edge {id} references unknown node {endpoint}"),
                    ));
                }
            }
            adjacency.entry(id.from).or_default().push(id.to);
        }

        let nodes = positions
            .into_iter()
            .map(|(id, (latitude, longitude))| {
                let node = Node {
                    id,
                    next_nodes: adjacency.remove(&id).unwrap_or_default(),
                    latitude,
                    longitude,
                };
                (id, node)
            })
            .collect();

        Ok(Self {
            nodes,
            edges: edges.into_iter().collect(),
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Outgoing neighbours of `id`, empty for unknown nodes.
    pub fn neighbours(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.next_nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Check both closure invariants, returning the first violation found.
    pub fn check_closure(&self) -> Result<()> {
        for id in self.edges.keys() {
            if !self.nodes.contains_key(&id.from) || !self.nodes.contains_key(&id.to) {
                return Err(Error::corrupt(
                    "graph",
                    format!("edge {id} has an endpoint outside the node set"),
                ));
            }
        }
        for node in self.nodes.values() {
            for &next in &node.next_nodes {
                if !self.edges.contains_key(&EdgeId::new(node.id, next)) {
                    return Err(Error::corrupt(
                        "graph",
                        format!("adjacency {} -> {next} has no edge", node.id),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
impl Graph {
    /// Adjacency with list order ignored.
    pub(crate) fn adjacency_sets(&self) -> BTreeMap<NodeId, BTreeSet<NodeId>> {
        self.nodes
            .values()
            .map(|node| (node.id, node.next_nodes.iter().copied().collect()))
            .collect()
    }

    /// Node positions keyed by id.
    pub(crate) fn positions(&self) -> BTreeMap<NodeId, (f64, f64)> {
        self.nodes
            .values()
            .map(|node| (node.id, (node.latitude, node.longitude)))
            .collect()
    }
}
