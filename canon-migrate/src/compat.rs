//! Version compatibility matrix.
//!
//! Deciding whether a transition `from -> to` is breaking, safe and whether it
//! needs a migration follows a fixed precedence:
//!
//! 1. identical versions are trivially safe
//! 2. an explicit override for the exact pair is returned verbatim
//! 3. otherwise the answer is derived from the semver delta
//!
//! Derivation errs toward "unsafe": a major bump or any downgrade requires a
//! migration review.
//!
//! Overrides come from a built-in curated table, optionally extended by a
//! `compatibility.toml` file:
//!
//! ```toml
//! [[transition]]
//! from = "1.4.0"
//! to = "2.0.0"
//! breaking = true
//! safe = false
//! migration_required = true
//! deprecations = ["LEGACY_VENDOR_TYPE"]
//! migration_script = "migrate_1_4_to_2_0"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use canon_registry::Version;

use crate::error::{MigrateResult, MigrationError};

/// Default overrides file name.
pub const OVERRIDES_FILE_NAME: &str = "compatibility.toml";

/// Outcome of comparing two versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRecord {
    /// Source version.
    pub from: Version,
    /// Target version.
    pub to: Version,
    /// Whether the transition breaks consumers.
    pub breaking: bool,
    /// Whether the transition can be applied without review.
    pub safe: bool,
    /// Whether the external store must be migrated.
    pub migration_required: bool,
    /// Identifiers deprecated by this transition.
    #[serde(default)]
    pub deprecations: Vec<String>,
    /// Named migration script for this transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_script: Option<String>,
}

impl CompatibilityRecord {
    fn derived(from: Version, to: Version, breaking: bool, safe: bool, required: bool) -> Self {
        Self {
            from,
            to,
            breaking,
            safe,
            migration_required: required,
            deprecations: Vec::new(),
            migration_script: None,
        }
    }

    /// A safe transition that needs no migration.
    pub fn safe(from: Version, to: Version) -> Self {
        Self::derived(from, to, false, true, false)
    }

    /// A breaking transition that requires a migration.
    pub fn breaking(from: Version, to: Version) -> Self {
        Self::derived(from, to, true, false, true)
    }

    /// Attach a migration script name.
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.migration_script = Some(script.into());
        self
    }

    /// Attach deprecated identifiers.
    pub fn with_deprecations(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.deprecations = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Kind of version change this record describes.
    pub fn change(&self) -> VersionChange {
        VersionChange::between(&self.from, &self.to)
    }
}

/// Kind of change between two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChange {
    /// Same version.
    None,
    /// Major component increased.
    Major,
    /// Minor component increased within the same major.
    Minor,
    /// Only the patch component increased.
    Patch,
    /// Target is lower than source.
    Downgrade,
}

impl VersionChange {
    /// Classify the change from `from` to `to`.
    pub fn between(from: &Version, to: &Version) -> Self {
        if from == to {
            VersionChange::None
        } else if to.major > from.major {
            VersionChange::Major
        } else if to.major == from.major && to.minor > from.minor {
            VersionChange::Minor
        } else if to.major == from.major && to.minor == from.minor && to.patch > from.patch {
            VersionChange::Patch
        } else {
            VersionChange::Downgrade
        }
    }
}

impl fmt::Display for VersionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionChange::None => write!(f, "no version change"),
            VersionChange::Major => write!(f, "major version change"),
            VersionChange::Minor => write!(f, "minor version change"),
            VersionChange::Patch => write!(f, "patch version change"),
            VersionChange::Downgrade => write!(f, "version downgrade"),
        }
    }
}

/// Curated overrides, as stored in `compatibility.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatibilityOverrides {
    /// Known transitions.
    #[serde(default, rename = "transition")]
    pub transitions: Vec<CompatibilityRecord>,
}

impl CompatibilityOverrides {
    /// Parse overrides from TOML.
    pub fn parse(content: &str) -> MigrateResult<Self> {
        toml::from_str(content).map_err(|e| {
            MigrationError::overrides(format!("Failed to parse overrides file: {}", e))
        })
    }

    /// Load overrides from a file. A missing file yields no overrides.
    pub async fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MigrationError::overrides(format!("Failed to read overrides file: {}", e))
        })?;

        Self::parse(&content)
    }
}

/// The compatibility matrix.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityMatrix {
    overrides: HashMap<(Version, Version), CompatibilityRecord>,
}

impl CompatibilityMatrix {
    /// Create a matrix with no overrides; every answer is derived.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a matrix seeded with the curated table of known transitions.
    pub fn builtin() -> Self {
        let v1_0 = Version::new(1, 0, 0);
        let v1_1 = Version::new(1, 1, 0);
        let v2_0 = Version::new(2, 0, 0);

        Self::new()
            .with_override(CompatibilityRecord::safe(v1_0, v1_1))
            .with_override(
                CompatibilityRecord::breaking(v1_0, v2_0).with_script("migrate_1_0_to_2_0"),
            )
            .with_override(
                CompatibilityRecord::breaking(v1_1, v2_0).with_script("migrate_1_1_to_2_0"),
            )
    }

    /// Add an override, replacing any existing entry for the same pair.
    pub fn with_override(mut self, record: CompatibilityRecord) -> Self {
        self.add_override(record);
        self
    }

    /// Add an override, replacing any existing entry for the same pair.
    pub fn add_override(&mut self, record: CompatibilityRecord) {
        self.overrides.insert((record.from, record.to), record);
    }

    /// Merge overrides loaded from a file; file entries win over existing ones.
    pub fn merge(&mut self, overrides: CompatibilityOverrides) {
        for record in overrides.transitions {
            self.add_override(record);
        }
    }

    /// Get the override for an exact pair.
    pub fn get_override(&self, from: &Version, to: &Version) -> Option<&CompatibilityRecord> {
        self.overrides.get(&(*from, *to))
    }

    /// Number of overrides.
    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Decide compatibility of `from -> to`.
    pub fn check(&self, from: &Version, to: &Version) -> CompatibilityRecord {
        if from == to {
            return CompatibilityRecord::safe(*from, *to);
        }

        if let Some(record) = self.get_override(from, to) {
            debug!(%from, %to, "Using compatibility override");
            return record.clone();
        }

        let record = match VersionChange::between(from, to) {
            VersionChange::Minor | VersionChange::Patch => CompatibilityRecord::safe(*from, *to),
            VersionChange::Major | VersionChange::Downgrade => {
                CompatibilityRecord::breaking(*from, *to)
            }
            // Unreachable after the equality check above; stay conservative.
            VersionChange::None => CompatibilityRecord::breaking(*from, *to),
        };

        debug!(%from, %to, safe = record.safe, breaking = record.breaking, "Derived compatibility");
        record
    }

    /// Parse both versions, then [`check`](Self::check).
    pub fn check_str(&self, from: &str, to: &str) -> MigrateResult<CompatibilityRecord> {
        let from = Version::parse(from)?;
        let to = Version::parse(to)?;
        Ok(self.check(&from, &to))
    }
}
