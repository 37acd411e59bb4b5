//! Project context shared by the commands.
//!
//! Relative paths in the configuration resolve against the directory holding
//! the configuration file, or the working directory when there is none.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use canon_migrate::{
    CompatibilityMatrix, CompatibilityOverrides, MemoryStore, MigrationEngine, RegistryStore,
};
use canon_registry::{Snapshot, load_snapshot};

use crate::config::{CONFIG_FILE_NAME, Config, DATABASE_URL_ENV, StoreProvider};
use crate::error::{CliError, CliResult};

/// Shared handle to whichever store the configuration selects.
pub type DynStore = Arc<dyn RegistryStore>;

/// Loaded configuration plus the directory it is rooted at.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory relative paths resolve against.
    pub root: PathBuf,
    /// Loaded configuration.
    pub config: Config,
}

impl Project {
    /// Load the project from an explicit config path or `./canon.toml`.
    ///
    /// An explicit path must exist; a missing `./canon.toml` means defaults.
    pub fn load(config_path: Option<&Path>) -> CliResult<Self> {
        let cwd = std::env::current_dir()?;

        match config_path {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    cwd.join(path)
                };
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                let config = Config::load(&path)?;
                let root = path.parent().map(Path::to_path_buf).unwrap_or(cwd);
                Ok(Self { root, config })
            }
            None => {
                let path = cwd.join(CONFIG_FILE_NAME);
                let config = if path.exists() {
                    Config::load(&path)?
                } else {
                    Config::default()
                };
                Ok(Self { root: cwd, config })
            }
        }
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Path of the canonical lockfile.
    pub fn snapshot_path(&self) -> PathBuf {
        self.resolve(&self.config.snapshot.path)
    }

    /// Load the canonical snapshot.
    pub async fn snapshot(&self) -> CliResult<Arc<Snapshot>> {
        let snapshot = load_snapshot(self.snapshot_path()).await?;
        Ok(Arc::new(snapshot))
    }

    /// Built-in compatibility table merged with the overrides file.
    pub async fn matrix(&self) -> CliResult<CompatibilityMatrix> {
        let path = self.resolve(&self.config.compatibility.overrides);
        let overrides = CompatibilityOverrides::load(&path).await?;

        let mut matrix = CompatibilityMatrix::builtin();
        matrix.merge(overrides);
        debug!(overrides = matrix.override_count(), "Loaded compatibility matrix");
        Ok(matrix)
    }

    /// Open the configured store for reading.
    pub async fn store(&self) -> CliResult<DynStore> {
        self.open_store(false).await
    }

    /// Open the configured store for writing, creating tables when needed.
    pub async fn store_for_write(&self) -> CliResult<DynStore> {
        self.open_store(true).await
    }

    /// Engine over the canonical snapshot, the merged matrix and `store`.
    pub async fn engine(&self, store: DynStore) -> CliResult<MigrationEngine<dyn RegistryStore>> {
        let snapshot = self.snapshot().await?;
        let matrix = self.matrix().await?;
        Ok(MigrationEngine::new(snapshot, store).with_matrix(matrix))
    }

    /// Engine for commands that never touch the store.
    pub async fn offline_engine(&self) -> CliResult<MigrationEngine<dyn RegistryStore>> {
        self.engine(Arc::new(MemoryStore::new())).await
    }

    async fn open_store(&self, for_write: bool) -> CliResult<DynStore> {
        match self.config.store.provider {
            StoreProvider::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreProvider::Postgresql => self.open_postgres(for_write).await,
        }
    }

    #[cfg(feature = "postgres")]
    async fn open_postgres(&self, for_write: bool) -> CliResult<DynStore> {
        let url = self.config.database_url().ok_or_else(|| {
            CliError::Config(format!(
                "No database URL configured; set [store] url or {}",
                DATABASE_URL_ENV
            ))
        })?;

        let store = canon_migrate::PostgresStore::connect(&url, &self.config.store.schema).await?;
        if for_write {
            store.ensure_tables().await?;
        }
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "postgres"))]
    async fn open_postgres(&self, _for_write: bool) -> CliResult<DynStore> {
        Err(CliError::Config(format!(
            "PostgreSQL support is not compiled in; rebuild with --features postgres \
             or use the memory provider ({} is ignored)",
            DATABASE_URL_ENV
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_relative_to_config_dir() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("canon.toml");
        std::fs::write(&config_path, "[snapshot]\npath = \"registry/canon.lock.json\"\n").unwrap();

        let project = Project::load(Some(&config_path)).unwrap();
        assert_eq!(
            project.snapshot_path(),
            dir.path().join("registry").join("canon.lock.json")
        );
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();
        let err = Project::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[tokio::test]
    async fn test_memory_store_and_default_matrix() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("canon.toml");
        std::fs::write(&config_path, "[store]\nprovider = \"memory\"\n").unwrap();

        let project = Project::load(Some(&config_path)).unwrap();
        let store = project.store().await.unwrap();
        assert!(store.read_metadata().await.unwrap().is_none());

        let matrix = project.matrix().await.unwrap();
        assert_eq!(matrix.override_count(), CompatibilityMatrix::builtin().override_count());
    }
}
