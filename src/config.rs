//! Server configuration
//!
//! Defaults, optional TOML config file, and CLI overrides. The CLI layer
//! wins over the file, which wins over the defaults.

use crate::cli::Cli;
use crate::error::{StashError, StashResult};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Resolved server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bucket prefixes requests may match; must be non-empty at startup
    pub buckets: Vec<String>,
    /// Address to bind the HTTP listener to
    pub host: IpAddr,
    pub port: u16,
    /// Root directory the cache namespace lives under
    pub cache_dir: PathBuf,
    /// Maximum number of cached prefixes
    pub cache_size: usize,
    /// Root of the local directory tree served as the object store
    pub store_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buckets: Vec::new(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            cache_dir: dirs::cache_dir().unwrap_or_else(std::env::temp_dir),
            cache_size: 100,
            store_root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load(path: &Path) -> StashResult<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StashError::io(format!("reading config from {}", path.display()), e))?;
        let config = toml::from_str(&content).map_err(|e| StashError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply CLI flags over whatever was loaded
    pub fn apply_cli(&mut self, cli: &Cli) {
        if !cli.buckets.is_empty() {
            self.buckets = cli.buckets.clone();
        }
        if let Some(host) = cli.host {
            self.host = host;
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(ref dir) = cli.cache_dir {
            self.cache_dir = dir.clone();
        }
        if let Some(size) = cli.cache_size {
            self.cache_size = size;
        }
        if let Some(ref root) = cli.store_root {
            self.store_root = root.clone();
        }
    }

    /// Check startup requirements
    pub fn validate(&self) -> StashResult<()> {
        if self.buckets.is_empty() {
            return Err(StashError::User(
                "at least one bucket prefix is required (--bucket)".to_string(),
            ));
        }
        if self.cache_size == 0 {
            return Err(StashError::User(
                "cache size must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// The namespace directory all cache artifacts live under
    pub fn namespace(&self) -> PathBuf {
        self.cache_dir.join("stash")
    }
}
