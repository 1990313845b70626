//! Geocoding capability and its Nominatim adapter.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::coords::Coordinates;
use crate::error::{Error, Result};
use crate::store::PlaceKey;

/// City and country a coordinate falls in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
}

impl Location {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }

    pub fn place_key(&self) -> PlaceKey {
        PlaceKey::new(self.country.clone(), self.city.clone())
    }
}

/// Forward and reverse geocoding.
pub trait Geocoder {
    /// City and country for `coordinates`, or `None` when either is unknown.
    fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<Option<Location>>;

    /// Best match for a free-text address.
    fn geocode(&self, address: &str) -> Result<Option<Coordinates>>;
}

/// [`Geocoder`] backed by a Nominatim HTTP endpoint.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(user_agent())
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            client,
            base_url: config.nominatim_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn reverse_geocode(&self, coordinates: &Coordinates) -> Result<Option<Location>> {
        let rounded = coordinates.rounded();
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", rounded.latitude.to_string()),
                ("lon", rounded.longitude.to_string()),
            ])
            .send()?
            .error_for_status()?;

        let body: ReverseResponse = response.json()?;
        let location = body.address.and_then(Address::into_location);
        debug!(coordinates = %rounded, ?location, "reverse geocoded");
        Ok(location)
    }

    fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()?
            .error_for_status()?;

        let hits: Vec<SearchHit> = response.json()?;
        let Some(hit) = hits.into_iter().next() else {
            info!(address, "address not found");
            return Ok(None);
        };
        let coordinates = match (hit.lat.parse::<f64>(), hit.lon.parse::<f64>()) {
            (Ok(latitude), Ok(longitude)) => Coordinates::new(latitude, longitude),
            _ => {
                debug!(address, lat = %hit.lat, lon = %hit.lon, "unparseable search hit");
                return Ok(None);
            }
        };
        debug!(address, coordinates = %coordinates, "geocoded address");
        Ok(Some(coordinates))
    }
}

fn user_agent() -> String {
    format!("GraphMapsApplication/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

impl Address {
    fn into_location(self) -> Option<Location> {
        let city = self.city.or(self.town).or(self.village)?;
        let country = self.country?;
        Some(Location { city, country })
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}
