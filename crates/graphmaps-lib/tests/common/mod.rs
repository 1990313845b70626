//! Scripted collaborators shared by the integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use graphmaps_lib::{
    Coordinates, Error, Geocoder, Location, NetworkProvider, PlaceKey, RawEdge, RawGraph, RawNode,
    Result,
};

pub const SOL: Coordinates = Coordinates {
    latitude: 40.4169,
    longitude: -3.7035,
};
pub const RETIRO: Coordinates = Coordinates {
    latitude: 40.4153,
    longitude: -3.6845,
};
pub const TOLEDO: Coordinates = Coordinates {
    latitude: 39.8628,
    longitude: -4.0273,
};
pub const LISBOA: Coordinates = Coordinates {
    latitude: 38.7223,
    longitude: -9.1393,
};

/// Reverse geocoder answering from a fixed table.
#[derive(Default)]
pub struct ScriptedGeocoder {
    places: Vec<(Coordinates, Location)>,
    addresses: HashMap<String, Coordinates>,
    offline: bool,
    calls: Mutex<usize>,
}

#[allow(dead_code)]
impl ScriptedGeocoder {
    /// Geocoder knowing the Madrid, Toledo and Lisbon fixtures.
    pub fn iberia() -> Self {
        Self::default()
            .with_place(SOL, "Madrid", "Spain")
            .with_place(RETIRO, "Madrid", "Spain")
            .with_place(TOLEDO, "Toledo", "Spain")
            .with_place(LISBOA, "Lisboa", "Portugal")
            .with_address("Puerta del Sol, Madrid", SOL)
            .with_address("Parque del Retiro, Madrid", RETIRO)
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn with_place(mut self, at: Coordinates, city: &str, country: &str) -> Self {
        self.places.push((at.rounded(), Location::new(city, country)));
        self
    }

    pub fn with_address(mut self, address: &str, at: Coordinates) -> Self {
        self.addresses.insert(address.to_string(), at);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Geocoder for ScriptedGeocoder {
    fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<Option<Location>> {
        *self.calls.lock().unwrap() += 1;
        if self.offline {
            return Err(Error::Io(std::io::Error::other("geocoder offline")));
        }
        let key = coordinates.rounded();
        Ok(self
            .places
            .iter()
            .find(|(at, _)| *at == key)
            .map(|(_, location)| location.clone()))
    }

    fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        *self.calls.lock().unwrap() += 1;
        if self.offline {
            return Err(Error::Io(std::io::Error::other("geocoder offline")));
        }
        Ok(self.addresses.get(address).copied())
    }
}

/// Network provider returning canned graphs and recording every call.
#[derive(Default)]
pub struct ScriptedProvider {
    pub place_network: Option<RawGraph>,
    pub around_network: Option<RawGraph>,
    pub place_calls: Mutex<Vec<PlaceKey>>,
    pub around_calls: Mutex<Vec<(Coordinates, f64)>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn serving(network: RawGraph) -> Self {
        Self {
            place_network: Some(network.clone()),
            around_network: Some(network),
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn place_calls(&self) -> Vec<PlaceKey> {
        self.place_calls.lock().unwrap().clone()
    }

    pub fn around_calls(&self) -> Vec<(Coordinates, f64)> {
        self.around_calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.place_calls().len() + self.around_calls().len()
    }
}

impl NetworkProvider for ScriptedProvider {
    fn fetch_place(&self, place: &PlaceKey) -> Result<Option<RawGraph>> {
        self.place_calls.lock().unwrap().push(place.clone());
        Ok(self.place_network.clone())
    }

    fn fetch_around(&self, center: &Coordinates, radius_m: f64) -> Result<Option<RawGraph>> {
        self.around_calls.lock().unwrap().push((*center, radius_m));
        Ok(self.around_network.clone())
    }
}

/// Small two-way street network around central Madrid.
///
/// Node 1 sits next to Puerta del Sol, node 4 next to Retiro.
pub fn madrid_network() -> RawGraph {
    let nodes = vec![
        RawNode::new(1, 40.4168, -3.7036),
        RawNode::new(2, 40.4170, -3.6980),
        RawNode::new(3, 40.4160, -3.6920),
        RawNode::new(4, 40.4154, -3.6847),
    ];
    let mut edges = Vec::new();
    for (from, to, length) in [(1, 2, 475.0), (2, 3, 520.0), (3, 4, 630.0)] {
        edges.push(RawEdge::new(from, to, length, None));
        edges.push(RawEdge::new(to, from, length, None));
    }
    RawGraph { nodes, edges }
}
