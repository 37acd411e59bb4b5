//! Error types for the migration engine.

use thiserror::Error;

use canon_registry::RegistryError;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration, validation and sync operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Registry construction or version parsing failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The compatibility check rejected the transition.
    #[error("Migration from {from} to {to} is not safe: {reason}")]
    UnsafeMigration {
        /// Source version.
        from: String,
        /// Target version.
        to: String,
        /// Why the transition was rejected.
        reason: String,
    },

    /// Breaking changes were found after the safety gate.
    #[error("Breaking changes detected between {from} and {to}: {}", findings.join("; "))]
    BreakingChangesDetected {
        /// Source version.
        from: String,
        /// Target version.
        to: String,
        /// Rendered findings.
        findings: Vec<String>,
    },

    /// A migration would write a snapshot other than its target version.
    #[error("Target version {target} does not match canonical snapshot version {canonical}")]
    TargetMismatch {
        /// Requested target version.
        target: String,
        /// Version of the loaded canonical snapshot.
        canonical: String,
    },

    /// The external store could not be reached.
    #[error("External store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store read or write failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The compatibility overrides file is invalid.
    #[error("Compatibility overrides error: {0}")]
    Overrides(String),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Create a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a store unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create an overrides error.
    pub fn overrides(msg: impl Into<String>) -> Self {
        Self::Overrides(msg.into())
    }

    /// Check if the caller can recover by re-invoking with `skip_validation`.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnsafeMigration { .. } | Self::BreakingChangesDetected { .. }
        )
    }
}
