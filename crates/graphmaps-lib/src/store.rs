//! Storage adapters: the place → graph index and the object store that holds
//! encoded graphs, path artifacts and rendered output.
//!
//! The backing technology is swappable. Filesystem and SQLite
//! implementations back the CLI, in-memory ones back tests.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::codec::{
    decode_edge_set, decode_graph, decode_predecessors, encode_edge_set, encode_graph,
    encode_predecessors,
};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::reconstruct::PathRequest;

/// Cache granularity for road-network downloads. Matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaceKey {
    pub country: String,
    pub city: String,
}

impl PlaceKey {
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            city: city.into(),
        }
    }
}

impl fmt::Display for PlaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// Identifier of one materialized graph snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(String);

impl GraphId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id (uuid v4, hex without hyphens).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn nodes_key(&self) -> String {
        format!("nodes-{}.json", self.0)
    }

    pub fn edges_key(&self) -> String {
        format!("edges-{}.json", self.0)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key/value blob storage.
pub trait ObjectStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fails with [`Error::ObjectNotFound`] when `key` is absent.
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Human-readable location of `key`, used for artifact references.
    fn location(&self, key: &str) -> String;
}

/// Place → graph id mapping.
pub trait PlaceIndex {
    fn lookup_place(&self, place: &PlaceKey) -> Result<Option<GraphId>>;

    /// Record a mapping. An existing mapping for the place is replaced.
    fn record_place(&self, place: &PlaceKey, graph_id: &GraphId) -> Result<()>;

    fn places(&self) -> Result<Vec<(PlaceKey, GraphId)>>;
}

/// Object store rooted at a directory; one file per key.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_component(key))
    }
}

impl ObjectStore for FsObjectStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let destination = self.object_path(key);
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&destination).map_err(|err| err.error)?;
        debug!(key, bytes = bytes.len(), path = %destination.display(), "wrote object");
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(key, bytes = bytes.len(), "read object");
                Ok(bytes)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(Error::ObjectNotFound {
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.object_path(key).is_file())
    }

    fn location(&self, key: &str) -> String {
        self.object_path(key).display().to_string()
    }
}

fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' | ':' => c,
            _ => '_',
        })
        .collect()
}

/// In-process object store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.guard().keys().cloned().collect()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.guard().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.guard()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ObjectNotFound {
                key: key.to_string(),
            })
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.guard().contains_key(key))
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

/// Place index stored in a SQLite table `graphs(country, city, graph_id)`.
pub struct SqlitePlaceIndex {
    connection: Connection,
}

impl SqlitePlaceIndex {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let connection = Connection::open(path)?;
        Self::initialise(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::initialise(Connection::open_in_memory()?)
    }

    fn initialise(connection: Connection) -> Result<Self> {
        connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS graphs (
                country TEXT NOT NULL,
                city TEXT NOT NULL,
                graph_id TEXT NOT NULL,
                PRIMARY KEY (country, city)
            );",
        )?;
        Ok(Self { connection })
    }
}

impl PlaceIndex for SqlitePlaceIndex {
    fn lookup_place(&self, place: &PlaceKey) -> Result<Option<GraphId>> {
        let graph_id = self
            .connection
            .query_row(
                "SELECT graph_id FROM graphs WHERE country = ?1 AND city = ?2",
                params![place.country, place.city],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        debug!(place = %place, hit = graph_id.is_some(), "place lookup");
        Ok(graph_id.map(GraphId))
    }

    fn record_place(&self, place: &PlaceKey, graph_id: &GraphId) -> Result<()> {
        self.connection.execute(
            "INSERT OR REPLACE INTO graphs (country, city, graph_id) VALUES (?1, ?2, ?3)",
            params![place.country, place.city, graph_id.as_str()],
        )?;
        info!(place = %place, graph_id = %graph_id, "recorded place mapping");
        Ok(())
    }

    fn places(&self) -> Result<Vec<(PlaceKey, GraphId)>> {
        let mut statement = self
            .connection
            .prepare("SELECT country, city, graph_id FROM graphs ORDER BY country, city")?;
        let rows = statement.query_map([], |row| {
            Ok((
                PlaceKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                GraphId(row.get::<_, String>(2)?),
            ))
        })?;
        let mut places = Vec::new();
        for row in rows {
            places.push(row?);
        }
        Ok(places)
    }
}

/// In-process place index.
#[derive(Debug, Default)]
pub struct MemoryPlaceIndex {
    places: Mutex<HashMap<PlaceKey, GraphId>>,
}

impl MemoryPlaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<PlaceKey, GraphId>> {
        self.places
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlaceIndex for MemoryPlaceIndex {
    fn lookup_place(&self, place: &PlaceKey) -> Result<Option<GraphId>> {
        Ok(self.guard().get(place).cloned())
    }

    fn record_place(&self, place: &PlaceKey, graph_id: &GraphId) -> Result<()> {
        self.guard().insert(place.clone(), graph_id.clone());
        Ok(())
    }

    fn places(&self) -> Result<Vec<(PlaceKey, GraphId)>> {
        let mut places: Vec<_> = self
            .guard()
            .iter()
            .map(|(place, id)| (place.clone(), id.clone()))
            .collect();
        places.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(places)
    }
}

/// Reads and writes encoded graphs through an [`ObjectStore`].
#[derive(Clone, Copy)]
pub struct GraphStore<'a> {
    objects: &'a dyn ObjectStore,
}

impl<'a> GraphStore<'a> {
    pub fn new(objects: &'a dyn ObjectStore) -> Self {
        Self { objects }
    }

    /// Persist `graph` as the node and edge objects of `graph_id`.
    pub fn save_graph(&self, graph_id: &GraphId, graph: &Graph) -> Result<()> {
        let encoded = encode_graph(graph)?;
        self.objects.write(&graph_id.nodes_key(), &encoded.nodes)?;
        self.objects.write(&graph_id.edges_key(), &encoded.edges)?;
        info!(
            graph_id = %graph_id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "stored graph"
        );
        Ok(())
    }

    /// Load and decode the graph stored under `graph_id`.
    pub fn load_graph(&self, graph_id: &GraphId) -> Result<Graph> {
        let nodes = self.objects.read(&graph_id.nodes_key())?;
        let edges = self.objects.read(&graph_id.edges_key())?;
        let graph = decode_graph(&nodes, &edges)?;
        debug!(
            graph_id = %graph_id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "loaded graph"
        );
        Ok(graph)
    }

    pub fn graph_exists(&self, graph_id: &GraphId) -> Result<bool> {
        Ok(self.objects.exists(&graph_id.nodes_key())?
            && self.objects.exists(&graph_id.edges_key())?)
    }
}

/// Reads and writes the `path-`, `visited-` and `active-<key>.json` objects
/// produced by the search process.
#[derive(Clone, Copy)]
pub struct PathArtifacts<'a> {
    objects: &'a dyn ObjectStore,
}

impl<'a> PathArtifacts<'a> {
    pub fn new(objects: &'a dyn ObjectStore) -> Self {
        Self { objects }
    }

    pub fn load(&self, key: &str) -> Result<PathRequest> {
        let predecessors = decode_predecessors(&self.objects.read(&format!("path-{key}.json"))?)?;
        let visited = decode_edge_set(
            "visited",
            &self.objects.read(&format!("visited-{key}.json"))?,
        )?;
        let active = decode_edge_set("active", &self.objects.read(&format!("active-{key}.json"))?)?;
        debug!(
            key,
            predecessors = predecessors.len(),
            visited = visited.len(),
            active = active.len(),
            "loaded path artifacts"
        );
        Ok(PathRequest::new(predecessors, visited, active))
    }

    pub fn save(&self, key: &str, request: &PathRequest) -> Result<()> {
        self.objects.write(
            &format!("path-{key}.json"),
            &encode_predecessors(request.predecessors())?,
        )?;
        self.objects.write(
            &format!("visited-{key}.json"),
            &encode_edge_set(request.visited())?,
        )?;
        self.objects.write(
            &format!("active-{key}.json"),
            &encode_edge_set(request.active())?,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{RawEdge, RawGraph, RawNode};

    fn tiny_graph() -> Graph {
        Graph::from_raw(&RawGraph {
            nodes: vec![
                RawNode::new(1, 1.0, 2.0),
                RawNode::new(2, 1.5, 2.5),
                RawNode::new(3, 1.2, 2.2),
            ],
            edges: vec![
                RawEdge::new(1, 3, 40.0, None),
                RawEdge::new(1, 2, 80.0, None),
            ],
        })
    }

    #[test]
    fn generated_graph_ids_are_unique_hex() {
        let a = GraphId::generate();
        let b = GraphId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.nodes_key(), format!("nodes-{a}.json"));
    }

    #[test]
    fn fs_store_round_trips_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path().join("graphs")).unwrap();
        store.write("nodes-abc.json", b"{}").unwrap();
        assert_eq!(store.read("nodes-abc.json").unwrap(), b"{}");
        assert!(store.exists("nodes-abc.json").unwrap());
        assert!(matches!(
            store.read("missing.json"),
            Err(Error::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn fs_store_keeps_keys_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();
        store.write("../escape.json", b"x").unwrap();
        assert!(!dir.path().parent().unwrap().join("escape.json").exists());
        assert_eq!(store.read("../escape.json").unwrap(), b"x");
    }

    #[test]
    fn sqlite_index_replaces_existing_mapping() {
        let index = SqlitePlaceIndex::open_in_memory().unwrap();
        let madrid = PlaceKey::new("Spain", "Madrid");
        assert_eq!(index.lookup_place(&madrid).unwrap(), None);

        index.record_place(&madrid, &GraphId::new("first")).unwrap();
        index.record_place(&madrid, &GraphId::new("second")).unwrap();

        assert_eq!(index.lookup_place(&madrid).unwrap(), Some(GraphId::new("second")));
        assert_eq!(index.places().unwrap().len(), 1);
    }

    #[test]
    fn sqlite_index_matches_places_exactly() {
        let index = SqlitePlaceIndex::open_in_memory().unwrap();
        index
            .record_place(&PlaceKey::new("Spain", "Madrid"), &GraphId::new("g1"))
            .unwrap();
        assert_eq!(
            index.lookup_place(&PlaceKey::new("Spain", "madrid")).unwrap(),
            None
        );
        assert_eq!(
            index.lookup_place(&PlaceKey::new("España", "Madrid")).unwrap(),
            None
        );
    }

    #[test]
    fn sqlite_index_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("places.db");
        {
            let index = SqlitePlaceIndex::open(&path).unwrap();
            index
                .record_place(&PlaceKey::new("Chile", "Santiago"), &GraphId::new("g9"))
                .unwrap();
        }
        let reopened = SqlitePlaceIndex::open(&path).unwrap();
        assert_eq!(
            reopened
                .lookup_place(&PlaceKey::new("Chile", "Santiago"))
                .unwrap(),
            Some(GraphId::new("g9"))
        );
    }

    #[test]
    fn graph_store_round_trips_graphs() {
        let objects = MemoryObjectStore::new();
        let store = GraphStore::new(&objects);
        let id = GraphId::new("g1");
        let graph = tiny_graph();

        assert!(!store.graph_exists(&id).unwrap());
        store.save_graph(&id, &graph).unwrap();
        assert!(store.graph_exists(&id).unwrap());
        assert_eq!(
            objects.keys(),
            vec!["edges-g1.json".to_string(), "nodes-g1.json".to_string()]
        );
        let loaded = store.load_graph(&id).unwrap();
        assert_eq!(loaded.positions(), graph.positions());
        assert_eq!(loaded.edges, graph.edges);
        assert_eq!(loaded.adjacency_sets(), graph.adjacency_sets());
    }

    #[test]
    fn missing_graph_surfaces_not_found() {
        let objects = MemoryObjectStore::new();
        let err = GraphStore::new(&objects)
            .load_graph(&GraphId::new("nope"))
            .expect_err("absent graph");
        assert!(matches!(err, Error::ObjectNotFound { .. }));
    }
}
