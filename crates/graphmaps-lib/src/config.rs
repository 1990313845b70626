use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use tracing::debug;

use crate::error::{Error, Result};

pub const DATA_DIR_ENV: &str = "GRAPHMAPS_DATA_DIR";
pub const NOMINATIM_URL_ENV: &str = "GRAPHMAPS_NOMINATIM_URL";
pub const OVERPASS_URL_ENV: &str = "GRAPHMAPS_OVERPASS_URL";
pub const PROBE_RADIUS_ENV: &str = "GRAPHMAPS_PROBE_RADIUS_M";
pub const HTTP_TIMEOUT_ENV: &str = "GRAPHMAPS_HTTP_TIMEOUT_SECS";

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Radius of the local snapping probes used on a cache hit.
pub const DEFAULT_PROBE_RADIUS_M: f64 = 200.0;

/// Overpass place downloads can take minutes for large cities.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 180;

const GRAPHS_DIR: &str = "graphs";
const PATHS_DIR: &str = "paths";
const PLACES_DB: &str = "places.db";

/// Runtime settings shared by the CLI and library adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub nominatim_url: String,
    pub overpass_url: String,
    pub probe_radius_m: f64,
    pub http_timeout: Duration,
}

impl Config {
    /// Resolve settings from the environment, falling back to defaults.
    ///
    /// The data directory resolution order is:
    /// 1. Explicit `data_dir` argument when provided.
    /// 2. `GRAPHMAPS_DATA_DIR` environment variable.
    /// 3. Platform-specific project data directory.
    pub fn from_env(data_dir: Option<&Path>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(explicit) => explicit.to_path_buf(),
            None => match env::var_os(DATA_DIR_ENV) {
                Some(value) => PathBuf::from(value),
                None => default_data_dir()?,
            },
        };

        let config = Self {
            data_dir,
            nominatim_url: env_string(NOMINATIM_URL_ENV, DEFAULT_NOMINATIM_URL),
            overpass_url: env_string(OVERPASS_URL_ENV, DEFAULT_OVERPASS_URL),
            probe_radius_m: env_parsed(PROBE_RADIUS_ENV, DEFAULT_PROBE_RADIUS_M)?,
            http_timeout: Duration::from_secs(env_parsed(
                HTTP_TIMEOUT_ENV,
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
        };
        debug!(?config, "resolved configuration");
        Ok(config)
    }

    /// Defaults rooted at `data_dir`, ignoring the environment.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            probe_radius_m: DEFAULT_PROBE_RADIUS_M,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn graphs_dir(&self) -> PathBuf {
        self.data_dir.join(GRAPHS_DIR)
    }

    pub fn paths_dir(&self) -> PathBuf {
        self.data_dir.join(PATHS_DIR)
    }

    pub fn places_db(&self) -> PathBuf {
        self.data_dir.join(PLACES_DB)
    }
}

/// Platform data directory, e.g. `~/.local/share/graphmaps` on Linux.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs =
        ProjectDirs::from("org", "graphmaps", "graphmaps").ok_or(Error::ProjectDirsUnavailable)?;
    Ok(dirs.data_dir().to_path_buf())
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| Error::InvalidConfig {
                name: name.to_string(),
                value,
            })
        }
        _ => Ok(default),
    }
}
