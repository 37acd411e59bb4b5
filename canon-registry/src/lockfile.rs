//! Canonical snapshot lockfile.
//!
//! The lockfile is a generated, read-only JSON artifact:
//!
//! ```json
//! {
//!   "kernelVersion": "1.2.0",
//!   "snapshotId": "snap_7f3a9c01d2e4b5a6",
//!   "generatedAt": "2024-05-01T12:00:00Z",
//!   "concepts": [{ "id": "INVOICE", "label": "Invoice", "category": "ENTITY", ... }],
//!   "valueSets": [{ "code": "CURRENCIES", "domain": "REFERENCE", ... }],
//!   "values": [{ "code": "USD", "valueSetCode": "CURRENCIES", "label": "US Dollar" }]
//! }
//! ```
//!
//! Every record goes through [`RegistryBuilder`], so a lockfile with ambiguous
//! identities never produces a snapshot.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::builder::RegistryBuilder;
use crate::error::{RegistryError, RegistryResult};
use crate::model::{Concept, Value, ValueSet};
use crate::snapshot::Snapshot;
use crate::version::Version;

/// Default lockfile name.
pub const LOCKFILE_NAME: &str = "canon.lock.json";

/// Raw lockfile document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    /// Registry version.
    pub kernel_version: String,
    /// Snapshot identity; derived from the content when empty.
    #[serde(default)]
    pub snapshot_id: String,
    /// Generation timestamp.
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    /// Concepts.
    #[serde(default)]
    pub concepts: Vec<Concept>,
    /// Value sets.
    #[serde(default)]
    pub value_sets: Vec<ValueSet>,
    /// Values.
    #[serde(default)]
    pub values: Vec<Value>,
}

impl Lockfile {
    /// Parse lockfile JSON.
    pub fn parse(json: &str) -> RegistryResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RegistryError::lockfile(format!("Failed to parse lockfile: {}", e)))
    }

    /// Read and parse a lockfile from disk.
    pub async fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RegistryError::lockfile(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Build the canonical snapshot described by this lockfile.
    pub fn into_snapshot(self) -> RegistryResult<Snapshot> {
        let version = Version::parse(&self.kernel_version)?;

        let mut builder = RegistryBuilder::new(version).with_snapshot_id(self.snapshot_id);
        if let Some(at) = self.generated_at {
            builder = builder.with_generated_at(at);
        }

        for concept in self.concepts {
            builder.register_concept(concept)?;
        }
        for value_set in self.value_sets {
            builder.register_value_set(value_set)?;
        }
        builder.add_values(self.values);

        builder.build()
    }
}

/// Load the canonical snapshot from a lockfile path.
pub async fn load_snapshot(path: impl AsRef<Path>) -> RegistryResult<Snapshot> {
    let path = path.as_ref();
    let snapshot = Lockfile::load(path).await?.into_snapshot()?;
    info!(
        path = %path.display(),
        version = %snapshot.kernel_version(),
        snapshot_id = %snapshot.snapshot_id(),
        "Loaded canonical snapshot"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOCKFILE: &str = r#"{
        "kernelVersion": "1.2.0",
        "snapshotId": "snap_test",
        "generatedAt": "2024-05-01T12:00:00Z",
        "concepts": [
            {"id": "INVOICE", "label": "Invoice", "category": "ENTITY", "domain": "FINANCE", "version": "1.0.0"},
            {"id": "CURRENCY", "label": "Currency", "category": "ATTRIBUTE", "domain": "REFERENCE", "version": "1.0.0"}
        ],
        "valueSets": [
            {"code": "CURRENCIES", "conceptId": "CURRENCY", "domain": "REFERENCE"}
        ],
        "values": [
            {"code": "USD", "valueSetCode": "CURRENCIES", "label": "US Dollar", "sortOrder": 1,
             "metadata": {"source": "iso4217"}},
            {"code": "EUR", "valueSetCode": "CURRENCIES", "label": "Euro", "sortOrder": 2}
        ]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let snapshot = Lockfile::parse(LOCKFILE).unwrap().into_snapshot().unwrap();
        assert_eq!(snapshot.kernel_version(), Version::new(1, 2, 0));
        assert_eq!(snapshot.snapshot_id(), "snap_test");
        assert_eq!(snapshot.concept_count(), 2);
        assert_eq!(snapshot.value_count(), 2);
        assert_eq!(
            snapshot
                .get_value("CURRENCIES", "USD")
                .and_then(|v| v.metadata.get("source"))
                .map(String::as_str),
            Some("iso4217")
        );
    }

    #[test]
    fn test_bad_version_rejected() {
        let json = LOCKFILE.replace("\"1.2.0\"", "\"1.2\"");
        let err = Lockfile::parse(&json).unwrap().into_snapshot().unwrap_err();
        assert!(matches!(err, RegistryError::InvalidVersionFormat(_)));
    }

    #[test]
    fn test_duplicate_concept_aborts_load() {
        let json = LOCKFILE.replace("\"id\": \"CURRENCY\"", "\"id\": \"INVOICE\"");
        let err = Lockfile::parse(&json).unwrap().into_snapshot().unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateIdentifier { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = Lockfile::parse("{").unwrap_err();
        assert!(matches!(err, RegistryError::Lockfile(_)));
    }

    #[tokio::test]
    async fn test_load_snapshot_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCKFILE_NAME);
        tokio::fs::write(&path, LOCKFILE).await.unwrap();

        let snapshot = load_snapshot(&path).await.unwrap();
        assert_eq!(snapshot.value_set_count(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_snapshot("/nonexistent/canon.lock.json").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
