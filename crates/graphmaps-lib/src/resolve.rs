//! Graph cache and resolution engine.
//!
//! Resolution turns two coordinates into a stored graph plus the two graph
//! nodes closest to them. The branching is split in two: the pure
//! [`classify_places`] / [`plan_resolution`] pair decides what to fetch, and
//! [`Resolver`] executes that plan against the injected collaborators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_PROBE_RADIUS_M;
use crate::coords::{haversine_km, midpoint, Coordinates};
use crate::error::{Error, Result};
use crate::geocode::{Geocoder, Location};
use crate::graph::{Graph, NodeId};
use crate::network::NetworkProvider;
use crate::raw::RawGraph;
use crate::store::{GraphId, GraphStore, PlaceIndex, PlaceKey};

/// Search algorithm the external search process should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchAlgorithm {
    #[default]
    Dijkstra,
    AStar,
    AStarEnhanced,
}

impl SearchAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchAlgorithm::Dijkstra => "dijkstra",
            SearchAlgorithm::AStar => "a_star",
            SearchAlgorithm::AStarEnhanced => "a_star_enhanced",
        }
    }
}

impl fmt::Display for SearchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dijkstra" => Ok(SearchAlgorithm::Dijkstra),
            "a_star" | "astar" => Ok(SearchAlgorithm::AStar),
            "a_star_enhanced" => Ok(SearchAlgorithm::AStarEnhanced),
            _ => Err(Error::InvalidConfig {
                name: "algorithm".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Whether both endpoints fall inside one cacheable place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceScope {
    SamePlace(PlaceKey),
    /// Same country, different cities.
    CrossPlace,
}

/// What the resolver will fetch for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionPlan {
    /// Uncached place: download the whole place and cache it.
    FullDownload { place: PlaceKey },
    /// Cached place: reuse the stored graph, snap with two small probes.
    CachedWithLocalProbe {
        place: PlaceKey,
        graph_id: GraphId,
        radius_m: f64,
    },
    /// Cross-place request: one uncached radius download around the midpoint.
    AdHocRadius { center: Coordinates, radius_m: f64 },
}

/// Discriminant of a [`ResolutionPlan`], reported with each resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    FullDownload,
    CachedWithLocalProbe,
    AdHocRadius,
}

impl ResolutionPlan {
    pub fn kind(&self) -> PlanKind {
        match self {
            ResolutionPlan::FullDownload { .. } => PlanKind::FullDownload,
            ResolutionPlan::CachedWithLocalProbe { .. } => PlanKind::CachedWithLocalProbe,
            ResolutionPlan::AdHocRadius { .. } => PlanKind::AdHocRadius,
        }
    }
}

/// Decide the scope of a request from the two reverse-geocoded locations.
///
/// Fails with [`Error::UnresolvableLocation`] when either location is unknown
/// or the countries differ.
pub fn classify_places(
    source: Option<Location>,
    destination: Option<Location>,
) -> Result<PlaceScope> {
    let Some(source) = source else {
        return Err(Error::unresolvable("source has no city/country"));
    };
    let Some(destination) = destination else {
        return Err(Error::unresolvable("destination has no city/country"));
    };
    if source.country != destination.country {
        return Err(Error::unresolvable(format!(
            "source and destination are in different countries ({} / {})",
            source.country, destination.country
        )));
    }
    if source.city == destination.city {
        Ok(PlaceScope::SamePlace(source.place_key()))
    } else {
        Ok(PlaceScope::CrossPlace)
    }
}

/// Pick the fetch plan for a classified request.
///
/// The ad-hoc radius covers twice the great-circle distance between the
/// endpoints, centred on their arithmetic midpoint.
pub fn plan_resolution(
    scope: PlaceScope,
    cached: Option<GraphId>,
    source: &Coordinates,
    destination: &Coordinates,
    probe_radius_m: f64,
) -> ResolutionPlan {
    match (scope, cached) {
        (PlaceScope::SamePlace(place), None) => ResolutionPlan::FullDownload { place },
        (PlaceScope::SamePlace(place), Some(graph_id)) => ResolutionPlan::CachedWithLocalProbe {
            place,
            graph_id,
            radius_m: probe_radius_m,
        },
        (PlaceScope::CrossPlace, _) => ResolutionPlan::AdHocRadius {
            center: midpoint(source, destination),
            radius_m: 2.0 * 1000.0 * haversine_km(source, destination),
        },
    }
}

/// Graph and snapped nodes for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub graph_id: GraphId,
    pub source_node: NodeId,
    pub destination_node: NodeId,
    pub plan: PlanKind,
}

/// A routing request as received from a caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub source: Coordinates,
    pub destination: Coordinates,
    #[serde(default)]
    pub algorithm: SearchAlgorithm,
}

/// Input handed to the external search process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHandoff {
    pub source: NodeId,
    pub destination: NodeId,
    /// Graph id of the stored graph to search.
    pub key: GraphId,
    pub algorithm: SearchAlgorithm,
}

/// Executes resolution plans against injected collaborators.
pub struct Resolver<'a> {
    geocoder: &'a dyn Geocoder,
    network: &'a dyn NetworkProvider,
    places: &'a dyn PlaceIndex,
    graphs: GraphStore<'a>,
    probe_radius_m: f64,
}

impl<'a> Resolver<'a> {
    pub fn new(
        geocoder: &'a dyn Geocoder,
        network: &'a dyn NetworkProvider,
        places: &'a dyn PlaceIndex,
        graphs: GraphStore<'a>,
    ) -> Self {
        Self {
            geocoder,
            network,
            places,
            graphs,
            probe_radius_m: DEFAULT_PROBE_RADIUS_M,
        }
    }

    pub fn with_probe_radius(mut self, radius_m: f64) -> Self {
        self.probe_radius_m = radius_m;
        self
    }

    /// Resolve two coordinates into a graph and the nearest node to each.
    pub fn resolve(&self, source: &Coordinates, destination: &Coordinates) -> Result<Resolution> {
        let scope = classify_places(self.locate(source)?, self.locate(destination)?)?;
        let cached = match &scope {
            PlaceScope::SamePlace(place) => self.places.lookup_place(place)?,
            PlaceScope::CrossPlace => None,
        };
        let plan = plan_resolution(scope, cached, source, destination, self.probe_radius_m);
        info!(plan = ?plan.kind(), "selected resolution plan");
        self.execute(&plan, source, destination)
    }

    /// Geocode two addresses, then [`resolve`](Self::resolve) them.
    pub fn resolve_addresses(&self, source: &str, destination: &str) -> Result<Resolution> {
        let source = self.geocode(source)?;
        let destination = self.geocode(destination)?;
        self.resolve(&source, &destination)
    }

    /// Resolve a request into the hand-off for the search process.
    pub fn resolve_request(&self, request: &RouteRequest) -> Result<SearchHandoff> {
        let resolution = self.resolve(&request.source, &request.destination)?;
        Ok(SearchHandoff {
            source: resolution.source_node,
            destination: resolution.destination_node,
            key: resolution.graph_id,
            algorithm: request.algorithm,
        })
    }

    /// Reverse-geocode `coordinates`. A geocoder failure is an
    /// [`Error::UnresolvableLocation`].
    pub fn locate(&self, coordinates: &Coordinates) -> Result<Option<Location>> {
        let rounded = coordinates.rounded();
        let location = self.geocoder.reverse_geocode(&rounded).map_err(|err| {
            warn!(coordinates = %rounded, error = %err, "reverse geocoding failed");
            Error::unresolvable(format!("reverse geocoding failed for {rounded}: {err}"))
        })?;
        debug!(coordinates = %rounded, ?location, "located coordinates");
        Ok(location)
    }

    /// Cached graph id for `place`, if any.
    pub fn cached_graph(&self, place: &PlaceKey) -> Result<Option<GraphId>> {
        self.places.lookup_place(place)
    }

    /// Download, store and record the full network of `place`.
    pub fn cache_place(&self, place: &PlaceKey) -> Result<(GraphId, RawGraph)> {
        let raw = self
            .network
            .fetch_place(place)?
            .filter(|raw| !raw.is_empty())
            .ok_or_else(|| Error::unresolvable(format!("no road network found for {place}")))?;
        let graph_id = self.persist(&raw)?;
        self.places.record_place(place, &graph_id)?;
        info!(place = %place, graph_id = %graph_id, "cached place graph");
        Ok((graph_id, raw))
    }

    /// Forward-geocode `address`. No match is [`Error::AddressNotFound`]; a
    /// geocoder failure is [`Error::UnresolvableLocation`].
    pub fn geocode(&self, address: &str) -> Result<Coordinates> {
        let coordinates = self.geocoder.geocode(address).map_err(|err| {
            warn!(address, error = %err, "geocoding failed");
            Error::unresolvable(format!("geocoding failed for '{address}': {err}"))
        })?;
        coordinates.ok_or_else(|| Error::AddressNotFound {
            address: address.to_string(),
        })
    }

    fn execute(
        &self,
        plan: &ResolutionPlan,
        source: &Coordinates,
        destination: &Coordinates,
    ) -> Result<Resolution> {
        let (graph_id, source_node, destination_node) = match plan {
            ResolutionPlan::FullDownload { place } => {
                let (graph_id, raw) = self.cache_place(place)?;
                let (source_node, destination_node) =
                    snap_pair(&raw, source, destination, source, 0.0)?;
                (graph_id, source_node, destination_node)
            }
            ResolutionPlan::CachedWithLocalProbe {
                graph_id, radius_m, ..
            } => {
                let source_node = self.probe(source, *radius_m)?;
                let destination_node = self.probe(destination, *radius_m)?;
                (graph_id.clone(), source_node, destination_node)
            }
            ResolutionPlan::AdHocRadius { center, radius_m } => {
                let raw = self
                    .network
                    .fetch_around(center, *radius_m)?
                    .filter(|raw| !raw.is_empty())
                    .ok_or(Error::NoNearbyRoad {
                        latitude: center.latitude,
                        longitude: center.longitude,
                        radius_m: *radius_m,
                    })?;
                let graph_id = self.persist(&raw)?;
                let (source_node, destination_node) =
                    snap_pair(&raw, source, destination, center, *radius_m)?;
                (graph_id, source_node, destination_node)
            }
        };

        info!(
            graph_id = %graph_id,
            source_node,
            destination_node,
            "resolved request"
        );
        Ok(Resolution {
            graph_id,
            source_node,
            destination_node,
            plan: plan.kind(),
        })
    }

    /// Snap `point` against a bounded probe around it.
    fn probe(&self, point: &Coordinates, radius_m: f64) -> Result<NodeId> {
        let no_road = || Error::NoNearbyRoad {
            latitude: point.latitude,
            longitude: point.longitude,
            radius_m,
        };
        let raw = self.network.fetch_around(point, radius_m)?.ok_or_else(no_road)?;
        let node = raw.nearest_node(point).ok_or_else(no_road)?;
        debug!(point = %point, node, "snapped via local probe");
        Ok(node)
    }

    fn persist(&self, raw: &RawGraph) -> Result<GraphId> {
        let graph = Graph::from_raw(raw);
        let graph_id = GraphId::generate();
        self.graphs.save_graph(&graph_id, &graph)?;
        Ok(graph_id)
    }
}

fn snap_pair(
    raw: &RawGraph,
    source: &Coordinates,
    destination: &Coordinates,
    center: &Coordinates,
    radius_m: f64,
) -> Result<(NodeId, NodeId)> {
    let index = raw.snap_index().ok_or(Error::NoNearbyRoad {
        latitude: center.latitude,
        longitude: center.longitude,
        radius_m,
    })?;
    Ok((index.nearest(source), index.nearest(destination)))
}
