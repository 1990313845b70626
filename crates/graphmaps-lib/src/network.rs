//! Road-network acquisition capability and its Overpass adapter.

use std::collections::{HashMap, HashSet};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::coords::{haversine_km, Coordinates};
use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::raw::{MaxSpeed, RawEdge, RawGraph, RawNode};
use crate::store::PlaceKey;

/// Highway classes considered drivable.
const DRIVABLE_HIGHWAYS: &str = "^(motorway|motorway_link|trunk|trunk_link|primary|primary_link|secondary|secondary_link|tertiary|tertiary_link|residential|unclassified|living_street|service)$";

/// Overpass server-side timeout, in seconds.
const QUERY_TIMEOUT_SECS: u64 = 180;

/// Source of raw road networks.
pub trait NetworkProvider {
    /// Full drivable network of a place, or `None` when the place is unknown
    /// or has no roads.
    fn fetch_place(&self, place: &PlaceKey) -> Result<Option<RawGraph>>;

    /// Drivable network within `radius_m` metres of `center`, or `None` when
    /// there is none.
    fn fetch_around(&self, center: &Coordinates, radius_m: f64) -> Result<Option<RawGraph>>;
}

/// [`NetworkProvider`] backed by an Overpass API interpreter endpoint.
pub struct OverpassProvider {
    client: Client,
    url: String,
}

impl OverpassProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(format!("GraphMapsApplication/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            client,
            url: config.overpass_url.clone(),
        })
    }

    fn run(&self, query: String) -> Result<Option<RawGraph>> {
        debug!(%query, "overpass query");
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain")
            .body(query)
            .send()?
            .error_for_status()?;

        let body: OverpassResponse = response.json()?;
        info!(elements = body.elements.len(), "downloaded road network");
        let raw = build_raw_graph(&body);
        Ok((!raw.is_empty()).then_some(raw))
    }
}

impl NetworkProvider for OverpassProvider {
    fn fetch_place(&self, place: &PlaceKey) -> Result<Option<RawGraph>> {
        info!(place = %place, "fetching place network");
        self.run(place_query(place))
    }

    fn fetch_around(&self, center: &Coordinates, radius_m: f64) -> Result<Option<RawGraph>> {
        info!(center = %center, radius_m, "fetching network around point");
        self.run(around_query(center, radius_m))
    }
}

fn place_query(place: &PlaceKey) -> String {
    format!(
        r#"[out:json][timeout:{QUERY_TIMEOUT_SECS}];
area["name"="{country}"]["admin_level"="2"]->.country;
area["name"="{city}"]["boundary"="administrative"]->.city;
(
  way["highway"~"{DRIVABLE_HIGHWAYS}"](area.city)(area.country);
);
(._;>;);
out body;"#,
        country = escape(&place.country),
        city = escape(&place.city),
    )
}

fn around_query(center: &Coordinates, radius_m: f64) -> String {
    format!(
        r#"[out:json][timeout:{QUERY_TIMEOUT_SECS}];
(
  way["highway"~"{DRIVABLE_HIGHWAYS}"](around:{radius:.1},{lat},{lon});
);
(._;>;);
out body;"#,
        radius = radius_m,
        lat = center.latitude,
        lon = center.longitude,
    )
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    elements: Vec<OsmElement>,
}

#[derive(Debug, Deserialize)]
struct OsmElement {
    #[serde(rename = "type")]
    elem_type: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    nodes: Option<Vec<i64>>,
    tags: Option<OsmTags>,
}

#[derive(Debug, Default, Deserialize)]
struct OsmTags {
    oneway: Option<String>,
    maxspeed: Option<String>,
}

/// Turn Overpass elements into a raw multigraph.
///
/// Each consecutive node pair of a way becomes an edge, plus the reverse edge
/// unless the way is one-way. Only nodes referenced by some edge are kept.
fn build_raw_graph(response: &OverpassResponse) -> RawGraph {
    let positions: HashMap<NodeId, (f64, f64)> = response
        .elements
        .iter()
        .filter(|elem| elem.elem_type == "node")
        .filter_map(|elem| Some((elem.id, (elem.lat?, elem.lon?))))
        .collect();

    let mut raw = RawGraph::default();
    let mut used = HashSet::new();
    let mut way_count = 0usize;

    for elem in response.elements.iter().filter(|e| e.elem_type == "way") {
        let Some(node_ids) = elem.nodes.as_ref() else {
            continue;
        };
        let tags = elem.tags.as_ref();
        let oneway = matches!(
            tags.and_then(|t| t.oneway.as_deref()),
            Some("yes") | Some("1") | Some("true")
        );
        let maxspeed = tags
            .and_then(|t| t.maxspeed.as_deref())
            .map(MaxSpeed::from_tag);

        for pair in node_ids.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let (Some(&(lat1, lon1)), Some(&(lat2, lon2))) =
                (positions.get(&from), positions.get(&to))
            else {
                continue;
            };
            let length = haversine_km(
                &Coordinates::new(lat1, lon1),
                &Coordinates::new(lat2, lon2),
            ) * 1000.0;

            raw.edges
                .push(RawEdge::new(from, to, length, maxspeed.clone()));
            if !oneway {
                raw.edges
                    .push(RawEdge::new(to, from, length, maxspeed.clone()));
            }
            used.insert(from);
            used.insert(to);
        }
        way_count += 1;
    }

    let mut ids: Vec<NodeId> = used.into_iter().collect();
    ids.sort_unstable();
    raw.nodes = ids
        .into_iter()
        .filter_map(|id| {
            positions
                .get(&id)
                .map(|&(lat, lon)| RawNode::new(id, lat, lon))
        })
        .collect();

    debug!(
        nodes = raw.nodes.len(),
        edges = raw.edges.len(),
        ways = way_count,
        "built raw graph"
    );
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RawGraph {
        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        build_raw_graph(&response)
    }

    #[test]
    fn two_way_street_yields_both_directions() {
        let raw = parse(
            r#"{"elements": [
                {"type": "node", "id": 1, "lat": 40.0, "lon": -3.0},
                {"type": "node", "id": 2, "lat": 40.001, "lon": -3.0},
                {"type": "node", "id": 3, "lat": 40.002, "lon": -3.0},
                {"type": "way", "id": 10, "nodes": [1, 2, 3],
                 "tags": {"highway": "residential", "maxspeed": "50"}}
            ]}"#,
        );
        assert_eq!(raw.nodes.len(), 3);
        assert_eq!(raw.edges.len(), 4);
        let forward = &raw.edges[0];
        assert_eq!((forward.from, forward.to), (1, 2));
        assert!((forward.length - 111.19).abs() < 0.5);
        assert_eq!(forward.maxspeed, Some(MaxSpeed::Text("50".into())));
        assert_eq!((raw.edges[1].from, raw.edges[1].to), (2, 1));
    }

    #[test]
    fn oneway_and_speed_lists() {
        let raw = parse(
            r#"{"elements": [
                {"type": "node", "id": 1, "lat": 40.0, "lon": -3.0},
                {"type": "node", "id": 2, "lat": 40.0, "lon": -3.001},
                {"type": "way", "id": 10, "nodes": [1, 2],
                 "tags": {"highway": "primary", "oneway": "yes", "maxspeed": "50;70"}}
            ]}"#,
        );
        assert_eq!(raw.edges.len(), 1);
        assert_eq!(
            raw.edges[0].maxspeed,
            Some(MaxSpeed::List(vec!["50".into(), "70".into()]))
        );
    }

    #[test]
    fn ways_with_unknown_nodes_are_skipped() {
        let raw = parse(
            r#"{"elements": [
                {"type": "node", "id": 1, "lat": 40.0, "lon": -3.0},
                {"type": "node", "id": 5, "lat": 41.0, "lon": -3.0},
                {"type": "way", "id": 10, "nodes": [1, 2]}
            ]}"#,
        );
        assert!(raw.is_empty());
        assert!(raw.edges.is_empty());
    }

    #[test]
    fn queries_embed_place_and_radius() {
        let query = place_query(&PlaceKey::new("Spain", "Madrid"));
        assert!(query.contains(r#"area["name"="Madrid"]["boundary"="administrative"]"#));
        assert!(query.contains(r#"area["name"="Spain"]["admin_level"="2"]"#));

        let query = around_query(&Coordinates::new(40.5, -3.25), 200.0);
        assert!(query.contains("(around:200.0,40.5,-3.25)"));
        assert!(query.contains("out body;"));
    }

    #[test]
    fn names_are_escaped() {
        assert_eq!(escape(r#"Say "hi""#), r#"Say \"hi\""#);
    }
}
