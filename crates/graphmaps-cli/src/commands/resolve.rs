//! Resolve command: coordinates or addresses to a search hand-off.

use anyhow::{bail, Context, Result};

use graphmaps_lib::{
    Coordinates, GraphStore, NominatimGeocoder, OverpassProvider, Resolver, RouteRequest,
    SearchAlgorithm, SearchHandoff,
};

use crate::workspace::Workspace;

/// Endpoints as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoints {
    Coordinates {
        from: Coordinates,
        to: Coordinates,
    },
    Addresses {
        from: String,
        to: String,
    },
}

impl Endpoints {
    /// Build endpoints from the mutually exclusive coordinate/address flags.
    pub fn from_args(
        from: Option<Coordinates>,
        to: Option<Coordinates>,
        from_address: Option<String>,
        to_address: Option<String>,
    ) -> Result<Self> {
        match (from, to, from_address, to_address) {
            (Some(from), Some(to), None, None) => Ok(Endpoints::Coordinates { from, to }),
            (None, None, Some(from), Some(to)) => Ok(Endpoints::Addresses { from, to }),
            _ => bail!("provide either --from/--to coordinates or --from-address/--to-address"),
        }
    }
}

pub fn handle_resolve(
    workspace: &Workspace,
    endpoints: &Endpoints,
    algorithm: SearchAlgorithm,
) -> Result<SearchHandoff> {
    let geocoder =
        NominatimGeocoder::new(&workspace.config).context("failed to build geocoder client")?;
    let network =
        OverpassProvider::new(&workspace.config).context("failed to build Overpass client")?;
    let resolver = Resolver::new(
        &geocoder,
        &network,
        &workspace.places,
        GraphStore::new(&workspace.graphs),
    )
    .with_probe_radius(workspace.config.probe_radius_m);

    let handoff = match endpoints {
        Endpoints::Coordinates { from, to } => resolver
            .resolve_request(&RouteRequest {
                source: *from,
                destination: *to,
                algorithm,
            })
            .with_context(|| format!("failed to resolve {from} -> {to}"))?,
        Endpoints::Addresses { from, to } => {
            let resolution = resolver
                .resolve_addresses(from, to)
                .with_context(|| format!("failed to resolve '{from}' -> '{to}'"))?;
            SearchHandoff {
                source: resolution.source_node,
                destination: resolution.destination_node,
                key: resolution.graph_id,
                algorithm,
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&handoff)?);
    Ok(handoff)
}
