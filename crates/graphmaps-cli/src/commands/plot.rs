//! Plot command: reconstruct a finished search and render it.

use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;

use graphmaps_lib::{
    plot_route, Error as LibError, GeoJsonRenderer, GraphStore, PathArtifacts, PathStatus,
    PlotRequest, RoutePlot,
};

use crate::workspace::Workspace;

/// Printable summary of a plotted route.
#[derive(Debug, Clone, Serialize)]
pub struct PlotOutput {
    pub distance_km: f64,
    pub time: String,
    pub travel_time_seconds: u64,
    pub average_speed_kmh: Option<f64>,
    #[serde(flatten)]
    pub status: PathStatus,
    pub artifact: String,
}

impl From<&RoutePlot> for PlotOutput {
    fn from(plot: &RoutePlot) -> Self {
        Self {
            distance_km: plot.metrics.total_distance_km,
            time: plot.metrics.formatted_time(),
            travel_time_seconds: plot.metrics.travel_time_seconds(),
            average_speed_kmh: plot.metrics.average_speed_kmh().ok(),
            status: plot.status,
            artifact: plot.artifact.location.clone(),
        }
    }
}

impl fmt::Display for PlotOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Distance: {} km", self.distance_km)?;
        writeln!(f, "Time: {}", self.time)?;
        if let Some(speed) = self.average_speed_kmh {
            writeln!(f, "Average speed: {speed:.1} km/h")?;
        }
        match self.status {
            PathStatus::Complete => writeln!(f, "Status: complete")?,
            PathStatus::Incomplete { stalled_at } => {
                writeln!(f, "Status: incomplete (stalled at node {stalled_at})")?
            }
        }
        write!(f, "Artifact: {}", self.artifact)
    }
}

pub fn handle_plot(
    workspace: &Workspace,
    request: &PlotRequest,
    require_complete: bool,
) -> Result<PlotOutput> {
    let renderer = GeoJsonRenderer::new(&workspace.paths);
    let plot = plot_route(
        GraphStore::new(&workspace.graphs),
        PathArtifacts::new(&workspace.paths),
        &renderer,
        request,
    )
    .with_context(|| {
        format!(
            "failed to plot solution {} on graph {}",
            request.solution_key, request.graph_id
        )
    })?;

    let output = PlotOutput::from(&plot);
    println!("{output}");

    if require_complete {
        if let PathStatus::Incomplete { stalled_at } = plot.status {
            return Err(LibError::IncompletePath {
                source_node: request.source,
                destination: request.destination,
                stalled_at,
            }
            .into());
        }
    }
    Ok(output)
}
