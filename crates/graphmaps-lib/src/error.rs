use thiserror::Error;

use crate::graph::NodeId;

/// Convenient result alias for the GraphMaps library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Geocoding failed, returned no address, or the endpoints lie in different countries.
    #[error("unable to resolve location: {reason}")]
    UnresolvableLocation { reason: String },

    /// A free-text address could not be turned into coordinates.
    #[error("no coordinates found for address '{address}'")]
    AddressNotFound { address: String },

    /// A bounded-radius probe found no drivable network around a coordinate.
    #[error("no drivable road within {radius_m} m of ({latitude}, {longitude})")]
    NoNearbyRoad {
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    },

    /// A stored graph object could not be decoded. Partial graphs are never returned.
    #[error("corrupt graph data in {object}: {message}")]
    CorruptGraphData { object: String, message: String },

    /// The predecessor chain broke before reaching the source node.
    #[error("path from {source_node} to {destination} is incomplete; chain stops at {stalled_at}")]
    IncompletePath {
        source_node: NodeId,
        destination: NodeId,
        stalled_at: NodeId,
    },

    /// The route has zero length or zero travel time.
    #[error("route has zero travel time; average speed is undefined")]
    DegeneratePath,

    /// The predecessor map references an edge the graph does not contain.
    #[error("predecessor map references missing edge {from} -> {to}")]
    MissingPathEdge { from: NodeId, to: NodeId },

    /// A requested object does not exist in the backing store.
    #[error("object {key} not found")]
    ObjectNotFound { key: String },

    /// No suitable project directories could be resolved for this platform.
    #[error("failed to resolve project directories for graph storage")]
    ProjectDirsUnavailable,

    /// A configuration value could not be parsed.
    #[error("invalid value '{value}' for {name}")]
    InvalidConfig { name: String, value: String },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for HTTP client errors.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Wrapper for JSON encoding errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn unresolvable(reason: impl Into<String>) -> Self {
        Error::UnresolvableLocation {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(object: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CorruptGraphData {
            object: object.into(),
            message: message.into(),
        }
    }
}
