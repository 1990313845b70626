use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Mean Earth radius in kilometres used by [`haversine_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Number of decimal places kept when coordinates take part in a lookup key.
const KEY_DECIMALS: i32 = 6;

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Copy rounded to six decimal places so repeated lookups for the same
    /// spot produce identical keys.
    pub fn rounded(&self) -> Self {
        Self {
            latitude: round_to(self.latitude, KEY_DECIMALS),
            longitude: round_to(self.longitude, KEY_DECIMALS),
        }
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Self) -> f64 {
        haversine_km(self, other)
    }

    /// Position on the unit sphere, used for nearest-neighbour indexing.
    pub(crate) fn to_unit_vector(self) -> [f64; 3] {
        let lat = self.latitude.to_radians();
        let lon = self.longitude.to_radians();
        [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinates {
    type Err = Error;

    /// Parse a `"lat,lon"` pair.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidConfig {
            name: "coordinates".to_string(),
            value: s.to_string(),
        };
        let (lat, lon) = s.split_once(',').ok_or_else(invalid)?;
        let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(invalid());
        }
        Ok(Self::new(latitude, longitude))
    }
}

/// Haversine great-circle distance in kilometres.
///
/// Inputs are degrees. Both latitude terms of the cosine product are
/// converted to radians along with the deltas.
pub fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = lat2 - lat1;
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Floating error can push h a hair above 1 for antipodal points.
    let kernel = 2.0 * h.min(1.0).sqrt().asin();
    EARTH_RADIUS_KM * kernel
}

/// Arithmetic midpoint of two coordinates (latitude mean, longitude mean).
pub fn midpoint(a: &Coordinates, b: &Coordinates) -> Coordinates {
    Coordinates {
        latitude: (a.latitude + b.latitude) / 2.0,
        longitude: (a.longitude + b.longitude) / 2.0,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
