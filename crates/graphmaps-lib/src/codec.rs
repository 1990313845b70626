//! Flat textual encoding of graphs and path artifacts.
//!
//! # Graph objects
//!
//! ```text
//! nodes-<graphId>.json  {"Nodes": {"<nodeId>": "<lat>,<lon>", ...}}
//! edges-<graphId>.json  {"Edges": {"<from>,<to>": "<length>,<maxspeed>", ...}}
//! ```
//!
//! Floats are written with Rust's shortest round-trip formatting, so decoding
//! an encoded graph reproduces the same values. Maps are emitted in key order
//! to keep the bytes stable for identical graphs.
//!
//! # Path artifacts
//!
//! ```text
//! path-<key>.json     {"<nodeId>": <nodeId> | null, ...}
//! visited-<key>.json  [[from, to], ...]
//! active-<key>.json   [[from, to], ...]
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::{Edge, EdgeId, Graph, NodeId};

#[derive(Debug, Serialize, Deserialize)]
struct NodesDocument {
    #[serde(rename = "Nodes")]
    nodes: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgesDocument {
    #[serde(rename = "Edges")]
    edges: BTreeMap<String, String>,
}

/// Encoded node and edge objects for one graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedGraph {
    pub nodes: Vec<u8>,
    pub edges: Vec<u8>,
}

/// Encode a graph into its node and edge JSON documents.
pub fn encode_graph(graph: &Graph) -> Result<EncodedGraph> {
    let nodes = NodesDocument {
        nodes: graph
            .nodes
            .values()
            .map(|node| {
                (
                    node.id.to_string(),
                    format!("{},{}", node.latitude, node.longitude),
                )
            })
            .collect(),
    };
    let edges = EdgesDocument {
        edges: graph
            .edges
            .values()
            .map(|edge| {
                (
                    edge.id.to_string(),
                    format!("{},{}", edge.length, edge.maxspeed),
                )
            })
            .collect(),
    };

    Ok(EncodedGraph {
        nodes: serde_json::to_vec(&nodes)?,
        edges: serde_json::to_vec(&edges)?,
    })
}

/// Decode node and edge documents back into a [`Graph`].
///
/// Any malformed entry aborts the whole load with
/// [`Error::CorruptGraphData`].
pub fn decode_graph(nodes: &[u8], edges: &[u8]) -> Result<Graph> {
    let nodes: NodesDocument = serde_json::from_slice(nodes)
        .map_err(|err| Error::corrupt("nodes", err.to_string()))?;
    let edges: EdgesDocument = serde_json::from_slice(edges)
        .map_err(|err| Error::corrupt("edges", err.to_string()))?;

    let mut positions = BTreeMap::new();
    for (key, value) in &nodes.nodes {
        let id = parse_field::<NodeId>("nodes", key, key)?;
        let [lat, lon] = split_pair("nodes", key, value)?;
        let latitude = parse_finite("nodes", key, lat)?;
        let longitude = parse_finite("nodes", key, lon)?;
        positions.insert(id, (latitude, longitude));
    }

    let mut decoded = BTreeMap::new();
    for (key, value) in &edges.edges {
        let [from, to] = split_pair("edges", key, key)?;
        let id = EdgeId::new(
            parse_field::<NodeId>("edges", key, from)?,
            parse_field::<NodeId>("edges", key, to)?,
        );
        let [length, maxspeed] = split_pair("edges", key, value)?;
        let edge = Edge {
            id,
            length: parse_finite("edges", key, length)?,
            maxspeed: parse_field::<i64>("edges", key, maxspeed)?,
        };
        decoded.insert(id, edge);
    }

    Graph::from_parts(positions, decoded)
}

fn split_pair<'a>(object: &str, key: &str, value: &'a str) -> Result<[&'a str; 2]> {
    let fields: Vec<&str> = value.split(',').collect();
    match fields.as_slice() {
        [first, second] => Ok([*first, *second]),
        _ => Err(Error::corrupt(
            object,
            format!(
                "entry '{key}' has {} comma-separated fields, expected 2",
                fields.len()
            ),
        )),
    }
}

fn parse_field<T: std::str::FromStr>(object: &str, key: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        Error::corrupt(
            object,
            format!("entry '{key}' has non-numeric value '{raw}'"),
        )
    })
}

fn parse_finite(object: &str, key: &str, raw: &str) -> Result<f64> {
    let value = parse_field::<f64>(object, key, raw)?;
    if !value.is_finite() {
        return Err(Error::corrupt(
            object,
            format!("entry '{key}' has non-finite value '{raw}'"),
        ));
    }
    Ok(value)
}

/// Decode `path-<key>.json`: stringified node id to predecessor or null.
pub fn decode_predecessors(bytes: &[u8]) -> Result<HashMap<NodeId, Option<NodeId>>> {
    let raw: HashMap<String, Option<NodeId>> =
        serde_json::from_slice(bytes).map_err(|err| Error::corrupt("path", err.to_string()))?;
    raw.into_iter()
        .map(|(key, value)| Ok((parse_field::<NodeId>("path", &key, &key)?, value)))
        .collect()
}

/// Decode `visited-<key>.json` / `active-<key>.json`: arrays of `[from, to]`.
pub fn decode_edge_set(object: &str, bytes: &[u8]) -> Result<HashSet<EdgeId>> {
    let raw: Vec<[NodeId; 2]> =
        serde_json::from_slice(bytes).map_err(|err| Error::corrupt(object, err.to_string()))?;
    Ok(raw
        .into_iter()
        .map(|[from, to]| EdgeId::new(from, to))
        .collect())
}

/// Encode a predecessor map in the `path-<key>.json` layout.
pub fn encode_predecessors(predecessors: &HashMap<NodeId, Option<NodeId>>) -> Result<Vec<u8>> {
    let ordered: BTreeMap<String, Option<NodeId>> = predecessors
        .iter()
        .map(|(node, previous)| (node.to_string(), *previous))
        .collect();
    Ok(serde_json::to_vec(&ordered)?)
}

/// Encode an edge set in the `visited-`/`active-<key>.json` layout.
pub fn encode_edge_set(edges: &HashSet<EdgeId>) -> Result<Vec<u8>> {
    let mut ordered: Vec<[NodeId; 2]> = edges.iter().map(|id| [id.from, id.to]).collect();
    ordered.sort_unstable();
    Ok(serde_json::to_vec(&ordered)?)
}
