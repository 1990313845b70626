//! Rendering capability and a GeoJSON implementation.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::graph::{EdgeId, Graph, NodeId};
use crate::reconstruct::{EdgeCategory, NodeCategory};
use crate::store::ObjectStore;

pub const BACKGROUND_COLOR: &str = "#000000";
pub const TITLE_COLOR: &str = "#3b528b";

/// Stroke style for one edge category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeStyle {
    pub color: &'static str,
    pub alpha: f64,
    pub line_width: f64,
}

/// Marker style for one node category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeStyle {
    pub color: &'static str,
    pub alpha: f64,
    pub size: f64,
}

/// Emphasis grows from unvisited to in-path (viridis 0.25, 0.45, 0.7, 1.0).
pub fn edge_style(category: EdgeCategory) -> EdgeStyle {
    match category {
        EdgeCategory::Unvisited => EdgeStyle {
            color: "#3b528b",
            alpha: 0.4,
            line_width: 0.4,
        },
        EdgeCategory::Visited => EdgeStyle {
            color: "#2a788e",
            alpha: 0.6,
            line_width: 0.5,
        },
        EdgeCategory::Active => EdgeStyle {
            color: "#44bf70",
            alpha: 0.8,
            line_width: 0.6,
        },
        EdgeCategory::InPath => EdgeStyle {
            color: "#fde725",
            alpha: 1.0,
            line_width: 0.7,
        },
    }
}

pub fn node_style(category: NodeCategory) -> NodeStyle {
    match category {
        NodeCategory::Source => NodeStyle {
            color: "blue",
            alpha: 1.0,
            size: 18.0,
        },
        NodeCategory::Destination => NodeStyle {
            color: "red",
            alpha: 1.0,
            size: 18.0,
        },
        NodeCategory::Other => NodeStyle {
            color: "white",
            alpha: 0.08,
            size: 0.2,
        },
    }
}

/// Everything a renderer needs for one annotated map.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub graph: &'a Graph,
    pub edges: &'a BTreeMap<EdgeId, EdgeCategory>,
    pub nodes: &'a BTreeMap<NodeId, NodeCategory>,
    pub title: &'a str,
    /// Key the artifact is stored under, without extension.
    pub key: &'a str,
}

/// Retrievable reference to a rendered artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    pub key: String,
    pub location: String,
}

/// Renders a classified graph into a stored artifact.
pub trait Renderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<ArtifactRef>;
}

/// Writes a styled GeoJSON `FeatureCollection` into an object store.
pub struct GeoJsonRenderer<'a> {
    objects: &'a dyn ObjectStore,
}

impl<'a> GeoJsonRenderer<'a> {
    pub fn new(objects: &'a dyn ObjectStore) -> Self {
        Self { objects }
    }
}

impl Renderer for GeoJsonRenderer<'_> {
    fn render(&self, request: &RenderRequest<'_>) -> Result<ArtifactRef> {
        let document = feature_collection(request)?;
        let key = format!("{}.geojson", request.key);
        self.objects.write(&key, &serde_json::to_vec(&document)?)?;

        let artifact = ArtifactRef {
            location: self.objects.location(&key),
            key,
        };
        info!(
            key = %artifact.key,
            location = %artifact.location,
            edges = request.edges.len(),
            "rendered route map"
        );
        Ok(artifact)
    }
}

fn feature_collection(request: &RenderRequest<'_>) -> Result<Value> {
    let graph = request.graph;
    let mut features = Vec::with_capacity(request.edges.len() + request.nodes.len());

    for (&id, &category) in request.edges {
        let (Some(from), Some(to)) = (graph.node(id.from), graph.node(id.to)) else {
            return Err(Error::corrupt(
                "edges",
                format!("edge {id} references a node missing from the graph"),
            ));
        };
        let style = edge_style(category);
        features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": [
                    [from.longitude, from.latitude],
                    [to.longitude, to.latitude],
                ],
            },
            "properties": {
                "edge": id.to_string(),
                "category": category.label(),
                "stroke": style.color,
                "stroke-opacity": style.alpha,
                "stroke-width": style.line_width,
            },
        }));
    }

    // Emphasised nodes last so they draw on top.
    let mut ordered: Vec<_> = request.nodes.iter().collect();
    ordered.sort_by_key(|(_, category)| **category != NodeCategory::Other);
    for (&id, &category) in ordered {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let style = node_style(category);
        features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [node.longitude, node.latitude],
            },
            "properties": {
                "node": id,
                "category": category,
                "marker-color": style.color,
                "marker-opacity": style.alpha,
                "marker-size": style.size,
            },
        }));
    }

    Ok(json!({
        "type": "FeatureCollection",
        "properties": {
            "title": request.title,
            "title-color": TITLE_COLOR,
            "background": BACKGROUND_COLOR,
        },
        "features": features,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{RawEdge, RawGraph, RawNode};
    use crate::store::MemoryObjectStore;

    fn pair() -> Graph {
        Graph::from_raw(&RawGraph {
            nodes: vec![RawNode::new(1, 40.0, -3.0), RawNode::new(2, 40.1, -3.1)],
            edges: vec![RawEdge::new(1, 2, 100.0, None)],
        })
    }

    #[test]
    fn emphasis_increases_towards_path() {
        let order = [
            EdgeCategory::Unvisited,
            EdgeCategory::Visited,
            EdgeCategory::Active,
            EdgeCategory::InPath,
        ];
        for window in order.windows(2) {
            let (low, high) = (edge_style(window[0]), edge_style(window[1]));
            assert!(low.alpha < high.alpha);
            assert!(low.line_width < high.line_width);
        }
    }

    #[test]
    fn writes_feature_collection() {
        let graph = pair();
        let edges = BTreeMap::from([(EdgeId::new(1, 2), EdgeCategory::InPath)]);
        let nodes = BTreeMap::from([(1, NodeCategory::Source), (2, NodeCategory::Destination)]);
        let store = MemoryObjectStore::new();
        let renderer = GeoJsonRenderer::new(&store);

        let artifact = renderer
            .render(&RenderRequest {
                graph: &graph,
                edges: &edges,
                nodes: &nodes,
                title: "Distance: 0.1 km",
                key: "solution-1",
            })
            .unwrap();

        assert_eq!(artifact.key, "solution-1.geojson");
        assert_eq!(artifact.location, "memory://solution-1.geojson");

        let document: Value = serde_json::from_slice(&store.read(&artifact.key).unwrap()).unwrap();
        assert_eq!(document["type"], "FeatureCollection");
        assert_eq!(document["properties"]["title"], "Distance: 0.1 km");
        let features = document["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["properties"]["category"], "in_path");
        assert_eq!(
            features[0]["geometry"]["coordinates"][0],
            json!([-3.0, 40.0])
        );
        assert_eq!(features[1]["properties"]["marker-color"], "blue");
    }

    #[test]
    fn unknown_edge_endpoint_is_corrupt() {
        let graph = pair();
        let edges = BTreeMap::from([(EdgeId::new(1, 9), EdgeCategory::Visited)]);
        let nodes = BTreeMap::new();
        let store = MemoryObjectStore::new();
        let err = GeoJsonRenderer::new(&store)
            .render(&RenderRequest {
                graph: &graph,
                edges: &edges,
                nodes: &nodes,
                title: "",
                key: "k",
            })
            .unwrap_err();
        assert!(matches!(err, Error::CorruptGraphData { .. }));
    }
}
