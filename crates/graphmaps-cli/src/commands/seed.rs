//! Seed command: pre-cache place graphs from a city list.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use graphmaps_lib::{
    seed_places, GraphStore, NominatimGeocoder, OverpassProvider, Resolver, SeedCity, SeedReport,
};

use crate::workspace::Workspace;

/// Read a JSON array of [`SeedCity`] entries.
pub fn load_cities(path: &Path) -> Result<Vec<SeedCity>> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read city list {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse city list {}", path.display()))
}

pub fn handle_seed(workspace: &Workspace, cities_path: &Path) -> Result<SeedReport> {
    let cities = load_cities(cities_path)?;
    let geocoder =
        NominatimGeocoder::new(&workspace.config).context("failed to build geocoder client")?;
    let network =
        OverpassProvider::new(&workspace.config).context("failed to build Overpass client")?;
    let resolver = Resolver::new(
        &geocoder,
        &network,
        &workspace.places,
        GraphStore::new(&workspace.graphs),
    );

    let report = seed_places(&resolver, &cities);
    println!(
        "Seeded {} place(s), skipped {}, failed {}",
        report.seeded, report.skipped, report.failed
    );
    Ok(report)
}
