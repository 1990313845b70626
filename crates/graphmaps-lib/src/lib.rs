//! GraphMaps library entry points.
//!
//! This crate resolves a pair of coordinates into a cached road-network graph
//! plus the two nearest graph nodes, and later turns the predecessor map
//! produced by an external search process back into route metrics and a
//! rendered artifact. Higher-level consumers (the CLI, workflow glue) should
//! only depend on the functions exported here instead of reimplementing
//! behavior.
//!

#![deny(warnings)]

pub mod codec;
pub mod config;
pub mod coords;
pub mod error;
pub mod geocode;
pub mod graph;
pub mod network;
pub mod plot;
pub mod raw;
pub mod reconstruct;
pub mod render;
pub mod resolve;
pub mod seed;
pub mod store;

pub use config::Config;
pub use coords::{haversine_km, midpoint, Coordinates, EARTH_RADIUS_KM};
pub use error::{Error, Result};
pub use geocode::{Geocoder, Location, NominatimGeocoder};
pub use graph::{Edge, EdgeId, Graph, Node, NodeId};
pub use network::{NetworkProvider, OverpassProvider};
pub use plot::{plot_route, PlotRequest, RoutePlot};
pub use raw::{MaxSpeed, RawEdge, RawGraph, RawNode, DEFAULT_MAXSPEED};
pub use reconstruct::{
    classify_edge, classify_edges, classify_nodes, format_travel_time, reconstruct_path,
    EdgeCategory, NodeCategory, PathRequest, PathStatus, Predecessor, Reconstruction,
    RouteMetrics,
};
pub use render::{ArtifactRef, GeoJsonRenderer, RenderRequest, Renderer};
pub use resolve::{
    classify_places, plan_resolution, PlaceScope, PlanKind, Resolution, ResolutionPlan,
    Resolver, RouteRequest, SearchAlgorithm, SearchHandoff,
};
pub use seed::{seed_places, SeedCity, SeedReport};
pub use store::{
    FsObjectStore, GraphId, GraphStore, MemoryObjectStore, MemoryPlaceIndex, ObjectStore,
    PathArtifacts, PlaceIndex, PlaceKey, SqlitePlaceIndex,
};
