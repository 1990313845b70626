//! Route reconstruction from a predecessor map and edge classification for
//! rendering.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::{EdgeId, Graph, NodeId};

/// Output of the external search process for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathRequest {
    predecessors: HashMap<NodeId, Option<NodeId>>,
    visited: HashSet<EdgeId>,
    active: HashSet<EdgeId>,
}

/// Result of looking up a node in the predecessor map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predecessor {
    Found(NodeId),
    NotFound,
}

impl PathRequest {
    pub fn new(
        predecessors: HashMap<NodeId, Option<NodeId>>,
        visited: HashSet<EdgeId>,
        active: HashSet<EdgeId>,
    ) -> Self {
        Self {
            predecessors,
            visited,
            active,
        }
    }

    /// Predecessor of `node`. Explicit nulls and missing keys are both `NotFound`.
    pub fn predecessor(&self, node: NodeId) -> Predecessor {
        match self.predecessors.get(&node).copied().flatten() {
            Some(previous) => Predecessor::Found(previous),
            None => Predecessor::NotFound,
        }
    }

    pub fn predecessors(&self) -> &HashMap<NodeId, Option<NodeId>> {
        &self.predecessors
    }

    pub fn visited(&self) -> &HashSet<EdgeId> {
        &self.visited
    }

    pub fn active(&self) -> &HashSet<EdgeId> {
        &self.active
    }
}

/// Distance, time and edge membership of a reconstructed route.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteMetrics {
    pub total_distance_km: f64,
    /// Hours, since speed limits are km/h.
    pub total_time_hours: f64,
    #[serde(skip)]
    pub edges_in_path: HashSet<EdgeId>,
}

impl RouteMetrics {
    /// Travel time in whole seconds, truncated.
    pub fn travel_time_seconds(&self) -> u64 {
        (self.total_time_hours * 3600.0) as u64
    }

    /// Travel time as `"M min S sec"`.
    pub fn formatted_time(&self) -> String {
        format_travel_time(self.total_time_hours)
    }

    /// Zero travel time: average-speed figures are undefined.
    pub fn is_degenerate(&self) -> bool {
        self.total_time_hours <= 0.0
    }

    /// Average speed in km/h. Fails with [`Error::DegeneratePath`] for a
    /// zero-time route instead of dividing by zero.
    pub fn average_speed_kmh(&self) -> Result<f64> {
        if self.is_degenerate() {
            return Err(Error::DegeneratePath);
        }
        Ok(self.total_distance_km / self.total_time_hours)
    }
}

/// Whether the predecessor walk reached the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PathStatus {
    Complete,
    /// The chain stopped at `stalled_at` without reaching the source.
    Incomplete { stalled_at: NodeId },
}

/// Reconstructed route plus its completion status.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub source: NodeId,
    pub destination: NodeId,
    pub metrics: RouteMetrics,
    pub status: PathStatus,
    /// Nodes walked, ordered from the furthest node reached towards the destination.
    pub nodes: Vec<NodeId>,
}

impl Reconstruction {
    pub fn is_complete(&self) -> bool {
        self.status == PathStatus::Complete
    }

    /// Turn an incomplete reconstruction into [`Error::IncompletePath`].
    pub fn require_complete(self) -> Result<Self> {
        match self.status {
            PathStatus::Complete => Ok(self),
            PathStatus::Incomplete { stalled_at } => Err(Error::IncompletePath {
                source_node: self.source,
                destination: self.destination,
                stalled_at,
            }),
        }
    }
}

/// Walk the predecessor map back from `destination` to `source`.
///
/// A missing predecessor or a revisited node ends the walk early with
/// [`PathStatus::Incomplete`]; metrics cover the edges walked so far. Only a
/// predecessor step with no matching graph edge (or an unusable speed limit)
/// is an error.
pub fn reconstruct_path(
    graph: &Graph,
    request: &PathRequest,
    source: NodeId,
    destination: NodeId,
) -> Result<Reconstruction> {
    let mut metrics = RouteMetrics::default();
    let mut walked = vec![destination];
    let mut seen = HashSet::from([destination]);
    let mut current = destination;
    let mut status = PathStatus::Complete;

    while current != source {
        let previous = match request.predecessor(current) {
            Predecessor::Found(previous) => previous,
            Predecessor::NotFound => {
                status = PathStatus::Incomplete {
                    stalled_at: current,
                };
                break;
            }
        };
        if !seen.insert(previous) {
            debug!(node = previous, "predecessor cycle detected");
            status = PathStatus::Incomplete {
                stalled_at: current,
            };
            break;
        }

        let id = EdgeId::new(previous, current);
        let edge = graph.edge(id).ok_or(Error::MissingPathEdge {
            from: previous,
            to: current,
        })?;
        if edge.maxspeed <= 0 {
            return Err(Error::corrupt(
                "edges",
                format!("edge {id} has non-positive maxspeed {}", edge.maxspeed),
            ));
        }

        let length_km = edge.length / 1000.0;
        metrics.total_distance_km += length_km;
        metrics.total_time_hours += length_km / edge.maxspeed as f64;
        metrics.edges_in_path.insert(id);
        walked.push(previous);
        current = previous;
    }

    walked.reverse();
    info!(
        source,
        destination,
        distance_km = metrics.total_distance_km,
        time = %metrics.formatted_time(),
        edges = metrics.edges_in_path.len(),
        complete = matches!(status, PathStatus::Complete),
        "reconstructed path"
    );

    Ok(Reconstruction {
        source,
        destination,
        metrics,
        status,
        nodes: walked,
    })
}

/// Format hours as `"M min S sec"`, truncating to whole seconds.
pub fn format_travel_time(hours: f64) -> String {
    let seconds = (hours * 3600.0) as u64;
    format!("{} min {} sec", seconds / 60, seconds % 60)
}

/// Rendering emphasis of an edge. Precedence: in-path, visited, active, unvisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCategory {
    InPath,
    Visited,
    Active,
    Unvisited,
}

impl EdgeCategory {
    pub fn label(self) -> &'static str {
        match self {
            EdgeCategory::InPath => "in_path",
            EdgeCategory::Visited => "visited",
            EdgeCategory::Active => "active",
            EdgeCategory::Unvisited => "unvisited",
        }
    }
}

/// Rendering role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Source,
    Destination,
    Other,
}

/// Classify a single edge. The first matching category wins.
pub fn classify_edge(id: EdgeId, metrics: &RouteMetrics, request: &PathRequest) -> EdgeCategory {
    if metrics.edges_in_path.contains(&id) {
        EdgeCategory::InPath
    } else if request.visited().contains(&id) {
        EdgeCategory::Visited
    } else if request.active().contains(&id) {
        EdgeCategory::Active
    } else {
        EdgeCategory::Unvisited
    }
}

/// Classify every edge of `graph`, not just the path.
pub fn classify_edges(
    graph: &Graph,
    metrics: &RouteMetrics,
    request: &PathRequest,
) -> BTreeMap<EdgeId, EdgeCategory> {
    graph
        .edges
        .keys()
        .map(|&id| (id, classify_edge(id, metrics, request)))
        .collect()
}

/// Mark the source and destination nodes. Source wins when they coincide.
pub fn classify_nodes(
    graph: &Graph,
    source: NodeId,
    destination: NodeId,
) -> BTreeMap<NodeId, NodeCategory> {
    graph
        .nodes
        .keys()
        .map(|&id| {
            let category = if id == source {
                NodeCategory::Source
            } else if id == destination {
                NodeCategory::Destination
            } else {
                NodeCategory::Other
            };
            (id, category)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{MaxSpeed, RawEdge, RawGraph, RawNode};

    fn chain() -> Graph {
        Graph::from_raw(&RawGraph {
            nodes: vec![
                RawNode::new(1, 0.0, 0.0),
                RawNode::new(2, 0.0, 0.01),
                RawNode::new(3, 0.0, 0.015),
                RawNode::new(4, 0.01, 0.0),
            ],
            edges: vec![
                RawEdge::new(1, 2, 1000.0, Some(MaxSpeed::Number(50))),
                RawEdge::new(2, 3, 500.0, Some(MaxSpeed::Number(25))),
                RawEdge::new(1, 4, 900.0, None),
                RawEdge::new(4, 3, 900.0, None),
            ],
        })
    }

    fn request(pairs: &[(NodeId, Option<NodeId>)]) -> PathRequest {
        PathRequest::new(
            pairs.iter().copied().collect(),
            HashSet::new(),
            HashSet::new(),
        )
    }

    #[test]
    fn three_node_chain_metrics() {
        let graph = chain();
        let req = request(&[(3, Some(2)), (2, Some(1)), (1, None)]);
        let result = reconstruct_path(&graph, &req, 1, 3).unwrap();

        assert!(result.is_complete());
        assert!((result.metrics.total_distance_km - 1.5).abs() < 1e-12);
        assert!((result.metrics.total_time_hours - 0.04).abs() < 1e-12);
        assert_eq!(result.metrics.travel_time_seconds(), 144);
        assert_eq!(result.metrics.formatted_time(), "2 min 24 sec");
        assert_eq!(result.nodes, vec![1, 2, 3]);
        assert_eq!(
            result.metrics.edges_in_path,
            HashSet::from([EdgeId::new(1, 2), EdgeId::new(2, 3)])
        );
    }

    #[test]
    fn broken_chain_is_reported_not_raised() {
        let graph = chain();
        let req = request(&[(3, Some(2))]);
        let result = reconstruct_path(&graph, &req, 1, 3).unwrap();

        assert_eq!(result.status, PathStatus::Incomplete { stalled_at: 2 });
        assert!((result.metrics.total_distance_km - 0.5).abs() < 1e-12);
        assert_eq!(result.nodes, vec![2, 3]);

        let err = result.require_complete().expect_err("incomplete");
        assert!(matches!(
            err,
            Error::IncompletePath {
                source_node: 1,
                destination: 3,
                stalled_at: 2
            }
        ));
    }

    #[test]
    fn cyclic_predecessors_terminate() {
        let graph = chain();
        let req = request(&[(3, Some(2)), (2, Some(3))]);
        let result = reconstruct_path(&graph, &req, 1, 3).unwrap();
        assert_eq!(result.status, PathStatus::Incomplete { stalled_at: 2 });
    }

    #[test]
    fn missing_edge_is_an_error() {
        let graph = chain();
        let req = request(&[(3, Some(1))]);
        let err = reconstruct_path(&graph, &req, 1, 3).expect_err("no 1->3 edge");
        assert!(matches!(err, Error::MissingPathEdge { from: 1, to: 3 }));
    }

    #[test]
    fn source_equal_to_destination_is_degenerate() {
        let graph = chain();
        let result = reconstruct_path(&graph, &PathRequest::default(), 2, 2).unwrap();

        assert!(result.is_complete());
        assert_eq!(result.metrics.total_distance_km, 0.0);
        assert!(result.metrics.is_degenerate());
        assert!(matches!(
            result.metrics.average_speed_kmh(),
            Err(Error::DegeneratePath)
        ));
        assert_eq!(result.metrics.formatted_time(), "0 min 0 sec");
    }

    #[test]
    fn average_speed_for_regular_route() {
        let graph = chain();
        let req = request(&[(3, Some(2)), (2, Some(1))]);
        let metrics = reconstruct_path(&graph, &req, 1, 3).unwrap().metrics;
        let speed = metrics.average_speed_kmh().unwrap();
        assert!((speed - 37.5).abs() < 1e-9);
    }

    #[test]
    fn time_formatting_truncates() {
        assert_eq!(format_travel_time(0.0), "0 min 0 sec");
        // 59.9 seconds stays 59.
        assert_eq!(format_travel_time(59.9 / 3600.0), "0 min 59 sec");
        assert_eq!(format_travel_time(1.5), "90 min 0 sec");
    }

    #[test]
    fn path_membership_dominates_visited_and_active() {
        let graph = chain();
        let in_path = EdgeId::new(1, 2);
        let req = PathRequest::new(
            HashMap::from([(3, Some(2)), (2, Some(1))]),
            HashSet::from([in_path, EdgeId::new(1, 4)]),
            HashSet::from([in_path, EdgeId::new(1, 4), EdgeId::new(4, 3)]),
        );
        let metrics = reconstruct_path(&graph, &req, 1, 3).unwrap().metrics;
        let categories = classify_edges(&graph, &metrics, &req);

        assert_eq!(categories[&in_path], EdgeCategory::InPath);
        assert_eq!(categories[&EdgeId::new(2, 3)], EdgeCategory::InPath);
        assert_eq!(categories[&EdgeId::new(1, 4)], EdgeCategory::Visited);
        assert_eq!(categories[&EdgeId::new(4, 3)], EdgeCategory::Active);
        assert_eq!(categories.len(), graph.edge_count());
    }

    #[test]
    fn untouched_edges_are_unvisited() {
        let graph = chain();
        let categories = classify_edges(&graph, &RouteMetrics::default(), &PathRequest::default());
        assert!(categories
            .values()
            .all(|category| *category == EdgeCategory::Unvisited));
    }

    #[test]
    fn node_roles() {
        let graph = chain();
        let roles = classify_nodes(&graph, 1, 3);
        assert_eq!(roles[&1], NodeCategory::Source);
        assert_eq!(roles[&3], NodeCategory::Destination);
        assert_eq!(roles[&2], NodeCategory::Other);

        let same = classify_nodes(&graph, 2, 2);
        assert_eq!(same[&2], NodeCategory::Source);
    }

    #[test]
    fn explicit_null_and_missing_key_both_mean_not_found() {
        let req = request(&[(1, None)]);
        assert_eq!(req.predecessor(1), Predecessor::NotFound);
        assert_eq!(req.predecessor(42), Predecessor::NotFound);
        assert_eq!(request(&[(2, Some(1))]).predecessor(2), Predecessor::Found(1));
    }
}
