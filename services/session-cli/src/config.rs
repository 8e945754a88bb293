//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! `SESSION_STORE_PATH` overrides the storage file path from the TOML.

use implicit_auth::DEFAULT_NAMESPACE;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file used when neither `--config` nor `CONFIG_PATH` is given
pub const DEFAULT_CONFIG_PATH: &str = "implicit-session.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Session storage settings
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// JSON file backing the storage medium
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Namespace key holding the session blob
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            namespace: default_namespace(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("session.json")
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Like [`load`](Self::load), but a missing file at the default location
    /// yields the defaults instead of an error.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
            return Config::default().finish();
        }
        Self::load(path)
    }

    fn finish(mut self) -> common::Result<Self> {
        if let Ok(p) = std::env::var("SESSION_STORE_PATH") {
            self.storage.path = PathBuf::from(p);
        }

        if self.storage.namespace.trim().is_empty() {
            return Err(common::Error::Config(
                "storage.namespace must not be empty".into(),
            ));
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(common::Error::Config(
                "storage.path must not be empty".into(),
            ));
        }

        Ok(self)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}
