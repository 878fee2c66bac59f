//! Typed configuration.
//!
//! Loaded from a TOML file; see `config/bus-server.example.toml` for the
//! full shape. The rest of the crate only ever sees the validated
//! structure, so a `Config` that loaded successfully is safe to index by
//! route.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no configuration file found (searched {0:?})")]
    NotFound(Vec<PathBuf>),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("route {index} references unknown stop {stop:?}")]
    UnknownStop { index: usize, stop: String },

    #[error("route {index} references unknown destination {destination:?}")]
    UnknownDestination { index: usize, destination: String },
}

/// HTTP server binding.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Where the GTFS dataset comes from and where it lives on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GtfsConfig {
    /// Upstream zip URL (ODPT or equivalent).
    pub source_url: String,
    /// Consumer key appended to the download URL, if the source needs one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Directory holding the extracted dataset.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// A monitored physical stop. One logical stop may cover several GTFS
/// stop_ids (the same pole serves multiple bays).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopConfig {
    pub name: String,
    pub stop_ids: Vec<String>,
}

/// A monitored (stop, destination) pair and how to present it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    /// Key into [`Config::stops`].
    pub stop: String,
    /// Key into [`Config::destinations`].
    pub destination: String,
    /// How the route is spoken ("the bus to Central").
    pub speech_name: String,
    /// Short label for display cards and frames.
    pub display_name: String,
    /// Override for the LaMetric frame key; defaults to `stop_destination`.
    #[serde(default)]
    pub lametric_key: Option<String>,
    /// Maximum arrivals returned for this route.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    3
}

impl RouteConfig {
    /// Stable key identifying this route in board payloads.
    pub fn key(&self) -> String {
        format!("{}_{}", self.stop, self.destination)
    }

    /// Key used in the LaMetric payload.
    pub fn lametric_key(&self) -> String {
        self.lametric_key.clone().unwrap_or_else(|| self.key())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub gtfs: GtfsConfig,
    pub stops: HashMap<String, StopConfig>,
    /// Destination name -> accepted heading-text patterns.
    pub destinations: HashMap<String, Vec<String>>,
    pub routes: Vec<RouteConfig>,
}

impl Config {
    /// Load and validate configuration from an explicit path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Search the standard locations and load the first file found.
    ///
    /// Order: `config/bus-server.toml` relative to the working directory,
    /// then `/etc/bus-server/config.toml`, then
    /// `~/.config/bus-server/config.toml`.
    pub fn find_and_load() -> Result<Self, ConfigError> {
        let mut candidates = vec![
            PathBuf::from("config/bus-server.toml"),
            PathBuf::from("/etc/bus-server/config.toml"),
        ];
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".config/bus-server/config.toml"));
        }

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }
        Err(ConfigError::NotFound(candidates))
    }

    /// Every route must reference a defined stop and destination.
    fn validate(&self) -> Result<(), ConfigError> {
        for (index, route) in self.routes.iter().enumerate() {
            if !self.stops.contains_key(&route.stop) {
                return Err(ConfigError::UnknownStop {
                    index,
                    stop: route.stop.clone(),
                });
            }
            if !self.destinations.contains_key(&route.destination) {
                return Err(ConfigError::UnknownDestination {
                    index,
                    destination: route.destination.clone(),
                });
            }
        }
        Ok(())
    }

    /// The stop a route monitors. Infallible for a validated config.
    pub fn stop_for(&self, route: &RouteConfig) -> Option<&StopConfig> {
        self.stops.get(&route.stop)
    }

    /// Heading patterns for a route's destination. Infallible for a
    /// validated config.
    pub fn patterns_for(&self, route: &RouteConfig) -> &[String] {
        self.destinations
            .get(&route.destination)
            .map_or(&[], Vec::as_slice)
    }
}
