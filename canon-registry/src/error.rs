//! Error types for registry construction.

use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Kind of registry entity an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A domain concept.
    Concept,
    /// A value set.
    ValueSet,
    /// A value inside a value set.
    Value,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Concept => write!(f, "concept"),
            EntityKind::ValueSet => write!(f, "value set"),
            EntityKind::Value => write!(f, "value"),
        }
    }
}

/// Errors raised while building or loading a registry snapshot.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An identifier was registered twice.
    #[error("Duplicate {kind} identifier '{id}'")]
    DuplicateIdentifier {
        /// Entity kind.
        kind: EntityKind,
        /// The duplicated identifier.
        id: String,
    },

    /// A value failed shape validation.
    #[error("Invalid value at index {index}: field '{field}' {reason}")]
    InvalidValueShape {
        /// Position of the value in its input list.
        index: usize,
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A version string is not `major.minor.patch`.
    #[error("Invalid version format '{0}': expected major.minor.patch")]
    InvalidVersionFormat(String),

    /// The canonical lockfile could not be read or decoded.
    #[error("Lockfile error: {0}")]
    Lockfile(String),

    /// An identifier contains a character reserved for store ids.
    #[error("Invalid {kind} identifier '{id}': {reason}")]
    InvalidIdentifier {
        /// Entity kind.
        kind: EntityKind,
        /// The rejected identifier.
        id: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl RegistryError {
    /// Create a duplicate identifier error.
    pub fn duplicate(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::DuplicateIdentifier {
            kind,
            id: id.into(),
        }
    }

    /// Create an invalid value shape error.
    pub fn invalid_value(index: usize, field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValueShape {
            index,
            field,
            reason: reason.into(),
        }
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(
        kind: EntityKind,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidIdentifier {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a lockfile error.
    pub fn lockfile(msg: impl Into<String>) -> Self {
        Self::Lockfile(msg.into())
    }
}
