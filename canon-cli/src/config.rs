//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use canon_migrate::OVERRIDES_FILE_NAME;
use canon_registry::LOCKFILE_NAME;

use crate::error::CliResult;

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "canon.toml";

/// Environment variable overriding `[store] url`
pub const DATABASE_URL_ENV: &str = "CANON_DATABASE_URL";

/// Canon CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Canonical snapshot configuration
    pub snapshot: SnapshotConfig,

    /// External store configuration
    pub store: StoreConfig,

    /// Compatibility matrix configuration
    pub compatibility: CompatibilityConfig,

    /// Drift report configuration
    pub drift: DriftConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML
    pub fn parse(content: &str) -> CliResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Database URL, preferring the environment over the file.
    pub fn database_url(&self) -> Option<String> {
        self.database_url_with(std::env::var(DATABASE_URL_ENV).ok())
    }

    fn database_url_with(&self, env: Option<String>) -> Option<String> {
        env.filter(|url| !url.is_empty())
            .or_else(|| self.store.url.clone())
    }
}

/// Canonical snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Path to the canonical lockfile
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(LOCKFILE_NAME),
        }
    }
}

/// Supported store providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// PostgreSQL database
    #[default]
    Postgresql,
    /// In-process store, discarded when the command exits
    Memory,
}

impl fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreProvider::Postgresql => write!(f, "postgresql"),
            StoreProvider::Memory => write!(f, "memory"),
        }
    }
}

/// External store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store provider
    pub provider: StoreProvider,

    /// Database connection URL
    pub url: Option<String>,

    /// Database schema holding the registry tables
    pub schema: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: StoreProvider::default(),
            url: None,
            schema: "public".to_string(),
        }
    }
}

/// Compatibility matrix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityConfig {
    /// Path to the curated overrides file
    pub overrides: PathBuf,
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            overrides: PathBuf::from(OVERRIDES_FILE_NAME),
        }
    }
}

/// Drift report configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Default path for the Markdown report
    pub report: Option<PathBuf>,
}
