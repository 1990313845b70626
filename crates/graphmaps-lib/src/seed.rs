//! Batch pre-caching of place graphs from a city list.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::coords::Coordinates;
use crate::error::{Error, Result};
use crate::resolve::Resolver;

/// One entry of a seed list such as `cities.json`.
///
/// Coordinates may be given as numbers or numeric strings. Entries without
/// coordinates are forward-geocoded from `"<city>, <country>"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedCity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_degrees")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_degrees")]
    pub lon: Option<f64>,
    /// Entries already marked as uploaded are skipped.
    #[serde(default)]
    pub uploaded: bool,
}

impl SeedCity {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.lat?, self.lon?))
    }

    /// `"<city>, <country>"` when both are present.
    pub fn address(&self) -> Option<String> {
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => Some(format!("{city}, {country}")),
            _ => None,
        }
    }

    fn label(&self) -> String {
        if let Some(name) = self.name.as_ref().or(self.city.as_ref()) {
            return name.clone();
        }
        match self.coordinates() {
            Some(coordinates) => coordinates.to_string(),
            None => "<unnamed>".to_string(),
        }
    }
}

/// Counts of what a seeding run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub seeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Download and cache every listed place that is not cached yet.
///
/// Entries already uploaded, without coordinates or a geocodable address,
/// unresolvable or already cached are skipped. A failure for one entry is logged and counted; the
/// batch carries on.
pub fn seed_places(resolver: &Resolver<'_>, cities: &[SeedCity]) -> SeedReport {
    let mut report = SeedReport::default();

    for city in cities {
        match seed_one(resolver, city) {
            Ok(true) => report.seeded += 1,
            Ok(false) => report.skipped += 1,
            Err(err) => {
                warn!(city = %city.label(), error = %err, "failed to seed place");
                report.failed += 1;
            }
        }
    }

    info!(
        seeded = report.seeded,
        skipped = report.skipped,
        failed = report.failed,
        "seeding finished"
    );
    report
}

fn seed_one(resolver: &Resolver<'_>, city: &SeedCity) -> Result<bool> {
    if city.uploaded {
        return Ok(false);
    }
    let Some(coordinates) = seed_coordinates(resolver, city)? else {
        info!(city = %city.label(), "no coordinates; skipping");
        return Ok(false);
    };
    let Some(location) = resolver.locate(&coordinates)? else {
        info!(city = %city.label(), "no city/country for coordinates; skipping");
        return Ok(false);
    };

    let place = location.place_key();
    if let Some(graph_id) = resolver.cached_graph(&place)? {
        info!(place = %place, graph_id = %graph_id, "already cached");
        return Ok(false);
    }

    info!(place = %place, "seeding place");
    resolver.cache_place(&place)?;
    Ok(true)
}

fn seed_coordinates(resolver: &Resolver<'_>, city: &SeedCity) -> Result<Option<Coordinates>> {
    if let Some(coordinates) = city.coordinates() {
        return Ok(Some(coordinates));
    }
    let Some(address) = city.address() else {
        return Ok(None);
    };
    match resolver.geocode(&address) {
        Ok(coordinates) => {
            debug!(address = %address, coordinates = %coordinates, "geocoded seed entry");
            Ok(Some(coordinates))
        }
        Err(Error::AddressNotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

fn lenient_degrees<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Degrees {
        Number(f64),
        Text(String),
    }

    match Option::<Degrees>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Degrees::Number(value)) => Ok(Some(value)),
        Some(Degrees::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
