use std::fs;

use anyhow::{Context, Result};

use graphmaps_lib::{Config, FsObjectStore, SqlitePlaceIndex};

/// Stores rooted at the configured data directory.
pub struct Workspace {
    pub config: Config,
    pub graphs: FsObjectStore,
    pub paths: FsObjectStore,
    pub places: SqlitePlaceIndex,
}

impl Workspace {
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!(
                "failed to create data directory {}",
                config.data_dir.display()
            )
        })?;
        let graphs = FsObjectStore::open(config.graphs_dir())
            .with_context(|| format!("failed to open {}", config.graphs_dir().display()))?;
        let paths = FsObjectStore::open(config.paths_dir())
            .with_context(|| format!("failed to open {}", config.paths_dir().display()))?;
        let places = SqlitePlaceIndex::open(&config.places_db())
            .with_context(|| format!("failed to open {}", config.places_db().display()))?;
        Ok(Self {
            config,
            graphs,
            paths,
            places,
        })
    }
}
