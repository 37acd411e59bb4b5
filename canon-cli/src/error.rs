//! CLI error types and result alias.

use miette::Diagnostic;
use thiserror::Error;

use canon_migrate::MigrationError;
use canon_registry::RegistryError;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(canon::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(canon::config))]
    Config(String),

    /// Canonical snapshot could not be loaded
    #[error("Snapshot error: {0}")]
    #[diagnostic(code(canon::snapshot))]
    Snapshot(String),

    /// Invalid input or failed preflight
    #[error("Validation error: {0}")]
    #[diagnostic(code(canon::validation))]
    Validation(String),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(canon::migration))]
    Migration(String),

    /// External store error
    #[error("Store error: {0}")]
    #[diagnostic(code(canon::store))]
    Store(String),

    /// Drift was detected
    #[error("Drift detected: {0}")]
    #[diagnostic(code(canon::drift))]
    Drift(String),

    /// Output rendering error
    #[error("Output error: {0}")]
    #[diagnostic(code(canon::output))]
    Output(String),
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(format!("Failed to serialize JSON: {}", err))
    }
}

impl From<RegistryError> for CliError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidVersionFormat(_) => CliError::Validation(err.to_string()),
            other => CliError::Snapshot(other.to_string()),
        }
    }
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Registry(e) => e.into(),
            MigrationError::StoreUnavailable(_) | MigrationError::Store(_) => {
                CliError::Store(err.to_string())
            }
            MigrationError::Overrides(msg) => CliError::Config(msg),
            MigrationError::Io(e) => CliError::Io(e),
            other => CliError::Migration(other.to_string()),
        }
    }
}
