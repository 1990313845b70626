use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::graph::NodeId;
use crate::reconstruct::{
    classify_edges, classify_nodes, reconstruct_path, PathStatus, RouteMetrics,
};
use crate::render::{ArtifactRef, RenderRequest, Renderer};
use crate::store::{GraphId, GraphStore, PathArtifacts};

/// A finished search to turn into a rendered route.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotRequest {
    pub graph_id: GraphId,
    /// Key of the `path-`/`visited-`/`active-<key>.json` artifacts.
    pub solution_key: String,
    pub source: NodeId,
    pub destination: NodeId,
}

/// Outcome of [`plot_route`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlot {
    pub metrics: RouteMetrics,
    pub status: PathStatus,
    pub artifact: ArtifactRef,
}

impl RoutePlot {
    /// Distance and time block used as the map title.
    pub fn title(&self) -> String {
        route_title(&self.metrics)
    }
}

/// Load a stored graph and path artifacts, reconstruct the route and render it.
///
/// Incomplete routes are still rendered; the status is reported with the plot.
pub fn plot_route(
    graphs: GraphStore<'_>,
    paths: PathArtifacts<'_>,
    renderer: &dyn Renderer,
    request: &PlotRequest,
) -> Result<RoutePlot> {
    let graph = graphs.load_graph(&request.graph_id)?;
    let path = paths.load(&request.solution_key)?;

    let reconstruction = reconstruct_path(&graph, &path, request.source, request.destination)?;
    if let PathStatus::Incomplete { stalled_at } = reconstruction.status {
        warn!(
            solution_key = %request.solution_key,
            stalled_at,
            "rendering incomplete route"
        );
    }

    let edges = classify_edges(&graph, &reconstruction.metrics, &path);
    let nodes = classify_nodes(&graph, request.source, request.destination);
    let title = route_title(&reconstruction.metrics);
    let artifact = renderer.render(&RenderRequest {
        graph: &graph,
        edges: &edges,
        nodes: &nodes,
        title: &title,
        key: &request.solution_key,
    })?;

    info!(
        graph_id = %request.graph_id,
        solution_key = %request.solution_key,
        artifact = %artifact.location,
        "plotted route"
    );
    Ok(RoutePlot {
        metrics: reconstruction.metrics,
        status: reconstruction.status,
        artifact,
    })
}

fn route_title(metrics: &RouteMetrics) -> String {
    format!(
        "Distance: {} km\nTime: {}",
        metrics.total_distance_km,
        metrics.formatted_time()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_shows_distance_and_time() {
        let metrics = RouteMetrics {
            total_distance_km: 1.5,
            total_time_hours: 0.04,
            ..RouteMetrics::default()
        };
        assert_eq!(route_title(&metrics), "Distance: 1.5 km\nTime: 2 min 24 sec");
    }
}
