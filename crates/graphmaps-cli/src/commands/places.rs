//! Places command: list cached place to graph mappings.

use anyhow::{Context, Result};

use graphmaps_lib::PlaceIndex;

use crate::workspace::Workspace;

pub fn handle_places(workspace: &Workspace) -> Result<usize> {
    let places = workspace
        .places
        .places()
        .context("failed to list cached places")?;

    if places.is_empty() {
        println!("No cached places.");
        return Ok(0);
    }
    for (place, graph_id) in &places {
        println!("{place}\t{graph_id}");
    }
    Ok(places.len())
}
