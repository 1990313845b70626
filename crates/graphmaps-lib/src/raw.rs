//! Raw road-network multigraph as delivered by a network provider, plus the
//! speed-limit policy and node snapping that operate on it.

use std::collections::HashSet;

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coords::Coordinates;
use crate::graph::NodeId;

/// Speed limit assumed when a way has no usable `maxspeed`.
pub const DEFAULT_MAXSPEED: i64 = 30;

/// KD-tree bucket size (kiddo default).
const BUCKET_SIZE: usize = 32;

/// `maxspeed` attribute as found on a raw way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxSpeed {
    Number(i64),
    Text(String),
    /// Several values for one physical way (for example per-lane limits).
    List(Vec<String>),
}

impl MaxSpeed {
    /// Interpret an OSM tag value; `;`-separated values become a list.
    pub fn from_tag(value: &str) -> Self {
        if value.contains(';') {
            MaxSpeed::List(value.split(';').map(|v| v.trim().to_string()).collect())
        } else {
            MaxSpeed::Text(value.trim().to_string())
        }
    }
}

/// Effective speed limit in km/h.
///
/// Lists resolve to their smallest numeric entry, numeric strings and integers
/// are taken as-is, and anything else falls back to [`DEFAULT_MAXSPEED`].
pub fn effective_maxspeed(maxspeed: Option<&MaxSpeed>) -> i64 {
    match maxspeed {
        Some(MaxSpeed::Number(value)) => *value,
        Some(MaxSpeed::Text(value)) => parse_numeric(value).unwrap_or(DEFAULT_MAXSPEED),
        Some(MaxSpeed::List(values)) => values
            .iter()
            .filter_map(|value| parse_numeric(value))
            .min()
            .unwrap_or(DEFAULT_MAXSPEED),
        None => DEFAULT_MAXSPEED,
    }
}

fn parse_numeric(value: &str) -> Option<i64> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: NodeId,
    pub latitude: f64,
    pub longitude: f64,
}

impl RawNode {
    pub fn new(id: NodeId, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// Length in metres.
    pub length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxspeed: Option<MaxSpeed>,
}

impl RawEdge {
    pub fn new(from: NodeId, to: NodeId, length: f64, maxspeed: Option<MaxSpeed>) -> Self {
        Self {
            from,
            to,
            length,
            maxspeed,
        }
    }
}

/// Directed multigraph with positioned nodes. Parallel edges are allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

impl RawGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Build a nearest-node index, or `None` when there are no nodes.
    pub fn snap_index(&self) -> Option<SnapIndex> {
        SnapIndex::build(self)
    }

    /// Nearest node to `location`, or `None` for an empty network.
    pub fn nearest_node(&self, location: &Coordinates) -> Option<NodeId> {
        self.snap_index().map(|index| index.nearest(location))
    }
}

/// KD-tree over node positions projected onto the unit sphere.
///
/// Chord length is monotonic in great-circle distance, so the Euclidean
/// nearest neighbour is also the geodesic one. Nodes sharing an exact
/// position are stored once, under the first id seen; a kiddo leaf cannot
/// hold more than `BUCKET_SIZE` identical points.
pub struct SnapIndex {
    tree: KdTree<f64, usize, 3, BUCKET_SIZE, u32>,
    ids: Vec<NodeId>,
}

impl SnapIndex {
    fn build(raw: &RawGraph) -> Option<Self> {
        if raw.nodes.is_empty() {
            return None;
        }

        let mut tree: KdTree<f64, usize, 3, BUCKET_SIZE, u32> = KdTree::new();
        let mut ids = Vec::with_capacity(raw.nodes.len());
        let mut seen: HashSet<[u64; 3]> = HashSet::with_capacity(raw.nodes.len());
        for node in &raw.nodes {
            let point = Coordinates::new(node.latitude, node.longitude).to_unit_vector();
            if !seen.insert(point.map(f64::to_bits)) {
                continue;
            }
            tree.add(&point, ids.len());
            ids.push(node.id);
        }

        debug!(
            node_count = raw.nodes.len(),
            distinct_positions = ids.len(),
            "built snap index"
        );
        Some(Self { tree, ids })
    }

    /// Identifier of the node closest to `location`.
    pub fn nearest(&self, location: &Coordinates) -> NodeId {
        let query = location.to_unit_vector();
        let neighbour = self.tree.nearest_one::<SquaredEuclidean>(&query);
        self.ids[neighbour.item]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_uses_smallest_numeric_entry() {
        let speeds = MaxSpeed::List(vec!["30".into(), "45".into(), "urban".into()]);
        assert_eq!(effective_maxspeed(Some(&speeds)), 30);
    }

    #[test]
    fn list_without_numbers_defaults() {
        let speeds = MaxSpeed::List(vec!["urban".into(), "".into()]);
        assert_eq!(effective_maxspeed(Some(&speeds)), DEFAULT_MAXSPEED);
    }

    #[test]
    fn absent_maxspeed_defaults_to_30() {
        assert_eq!(effective_maxspeed(None), 30);
    }

    #[test]
    fn integer_maxspeed_is_used_verbatim() {
        assert_eq!(effective_maxspeed(Some(&MaxSpeed::Number(50))), 50);
    }

    #[test]
    fn text_maxspeed_must_be_purely_numeric() {
        assert_eq!(effective_maxspeed(Some(&MaxSpeed::Text("80".into()))), 80);
        assert_eq!(
            effective_maxspeed(Some(&MaxSpeed::Text("50 mph".into()))),
            DEFAULT_MAXSPEED
        );
        assert_eq!(
            effective_maxspeed(Some(&MaxSpeed::Text("-10".into()))),
            DEFAULT_MAXSPEED
        );
    }

    #[test]
    fn tag_with_semicolons_becomes_list() {
        assert_eq!(
            MaxSpeed::from_tag("50;70"),
            MaxSpeed::List(vec!["50".into(), "70".into()])
        );
        assert_eq!(MaxSpeed::from_tag("50"), MaxSpeed::Text("50".into()));
    }

    #[test]
    fn maxspeed_deserializes_from_any_shape() {
        let number: MaxSpeed = serde_json::from_str("50").unwrap();
        let text: MaxSpeed = serde_json::from_str("\"50\"").unwrap();
        let list: MaxSpeed = serde_json::from_str("[\"30\",\"45\"]").unwrap();
        assert_eq!(number, MaxSpeed::Number(50));
        assert_eq!(text, MaxSpeed::Text("50".into()));
        assert_eq!(list, MaxSpeed::List(vec!["30".into(), "45".into()]));
    }

    #[test]
    fn snapping_picks_closest_node() {
        let raw = RawGraph {
            nodes: vec![
                RawNode::new(10, 40.0, -3.0),
                RawNode::new(11, 40.01, -3.0),
                RawNode::new(12, 40.02, -3.01),
            ],
            edges: Vec::new(),
        };
        assert_eq!(raw.nearest_node(&Coordinates::new(40.0001, -3.0001)), Some(10));
        assert_eq!(raw.nearest_node(&Coordinates::new(40.012, -3.0)), Some(11));
        assert_eq!(raw.nearest_node(&Coordinates::new(40.03, -3.02)), Some(12));
    }

    #[test]
    fn snapping_tolerates_stacked_coincident_nodes() {
        let mut nodes: Vec<RawNode> = (1..=40).map(|id| RawNode::new(id, 40.0, -3.0)).collect();
        nodes.push(RawNode::new(99, 40.05, -3.0));
        let raw = RawGraph {
            nodes,
            edges: Vec::new(),
        };
        assert_eq!(raw.nearest_node(&Coordinates::new(40.0001, -3.0)), Some(1));
        assert_eq!(raw.nearest_node(&Coordinates::new(40.049, -3.0)), Some(99));
    }

    #[test]
    fn snapping_on_empty_network_yields_nothing() {
        assert_eq!(RawGraph::default().nearest_node(&Coordinates::new(0.0, 0.0)), None);
    }
}
