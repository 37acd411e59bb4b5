//! Reading the current state of the external store.
//!
//! The reader only performs I/O; comparison lives in [`crate::validate`].
//! A fresh [`ExternalStoreSnapshot`] is read for every validation or drift run.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use tracing::debug;

use canon_registry::Snapshot;

use crate::error::MigrateResult;
use crate::store::{MetadataRow, RegistryStore};

/// What the external store currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalStoreSnapshot {
    /// Current metadata row, if the store has one.
    pub metadata: Option<MetadataRow>,
    /// Active concept ids.
    pub concept_ids: BTreeSet<String>,
    /// Active value set ids.
    pub value_set_ids: BTreeSet<String>,
    /// Active value codes for each tracked value set.
    pub values: BTreeMap<String, BTreeSet<String>>,
}

impl ExternalStoreSnapshot {
    /// A store state that exactly mirrors `snapshot`.
    pub fn mirror(snapshot: &Snapshot) -> Self {
        let values = snapshot
            .list_value_sets()
            .map(|set| {
                let id = set.id();
                let codes = snapshot
                    .value_codes(&id)
                    .into_iter()
                    .map(String::from)
                    .collect();
                (id, codes)
            })
            .collect();

        Self {
            metadata: Some(MetadataRow {
                kernel_version: snapshot.kernel_version().to_string(),
                snapshot_id: snapshot.snapshot_id().to_string(),
                applied_at: Utc::now(),
                is_current: true,
            }),
            concept_ids: snapshot.concept_ids().into_iter().map(String::from).collect(),
            value_set_ids: snapshot
                .value_set_ids()
                .into_iter()
                .map(String::from)
                .collect(),
            values,
        }
    }

    /// Value codes held for one value set.
    pub fn values_for(&self, value_set_id: &str) -> Option<&BTreeSet<String>> {
        self.values.get(value_set_id)
    }
}

/// Reads an [`ExternalStoreSnapshot`] from a store.
pub struct SnapshotReader<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RegistryStore + ?Sized> SnapshotReader<'a, S> {
    /// Create a reader.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Read the store, tracking values for the given value sets.
    ///
    /// Every tracked set appears in [`ExternalStoreSnapshot::values`], with an
    /// empty code set when the store holds nothing for it.
    pub async fn read(&self, tracked_value_sets: &[&str]) -> MigrateResult<ExternalStoreSnapshot> {
        let (metadata, concept_ids, value_set_ids, stored_values) = tokio::try_join!(
            self.store.read_metadata(),
            self.store.read_concept_ids(),
            self.store.read_value_set_ids(),
            self.store.read_values(None),
        )?;

        let mut values: BTreeMap<String, BTreeSet<String>> = tracked_value_sets
            .iter()
            .map(|id| (id.to_string(), BTreeSet::new()))
            .collect();
        for value in stored_values {
            if let Some(codes) = values.get_mut(&value.value_set_id) {
                codes.insert(value.value_key);
            }
        }

        let external = ExternalStoreSnapshot {
            metadata,
            concept_ids: concept_ids.into_iter().collect(),
            value_set_ids: value_set_ids.into_iter().collect(),
            values,
        };

        debug!(
            has_metadata = external.metadata.is_some(),
            concepts = external.concept_ids.len(),
            value_sets = external.value_set_ids.len(),
            tracked = external.values.len(),
            "Read external store snapshot"
        );

        Ok(external)
    }

    /// Read the store, tracking every value set of the canonical snapshot.
    pub async fn read_for(&self, canonical: &Snapshot) -> MigrateResult<ExternalStoreSnapshot> {
        let tracked: Vec<String> = canonical.list_value_sets().map(|s| s.id()).collect();
        let tracked: Vec<&str> = tracked.iter().map(String::as_str).collect();
        self.read(&tracked).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ValueRow};
    use crate::sync::Synchronizer;
    use canon_registry::{Category, Concept, Domain, RegistryBuilder, Value, ValueSet, Version};

    fn snapshot() -> Snapshot {
        let mut builder = RegistryBuilder::new(Version::new(1, 0, 0));
        builder
            .register_concept(Concept::new(
                "INVOICE",
                "Invoice",
                Category::Entity,
                Domain::Finance,
                "1.0.0",
            ))
            .unwrap();
        builder
            .register_value_set(ValueSet::new("CURRENCIES", Domain::Reference))
            .unwrap();
        builder
            .register_value_set(ValueSet::new("COUNTRIES", Domain::Reference))
            .unwrap();
        builder.add_value(Value::new("CURRENCIES", "USD", "US Dollar"));
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_read_empty_store() {
        let store = MemoryStore::new();
        let external = SnapshotReader::new(&store)
            .read_for(&snapshot())
            .await
            .unwrap();

        assert!(external.metadata.is_none());
        assert!(external.concept_ids.is_empty());
        assert_eq!(external.values.len(), 2);
        assert!(external.values_for("COUNTRIES").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_synced_store_matches_mirror() {
        let store = MemoryStore::new();
        let snapshot = snapshot();
        Synchronizer::new(&store).apply(&snapshot).await.unwrap();

        let mut external = SnapshotReader::new(&store)
            .read_for(&snapshot)
            .await
            .unwrap();
        let mut mirror = ExternalStoreSnapshot::mirror(&snapshot);

        // Timestamps differ; everything else must match.
        external.metadata.as_mut().unwrap().applied_at = Utc::now();
        mirror.metadata = external.metadata.clone();
        assert_eq!(external, mirror);
    }

    #[tokio::test]
    async fn test_untracked_values_ignored() {
        let store = MemoryStore::new();
        let row = ValueRow::from(&Value::new("UNTRACKED", "X", "X"));
        store.upsert_values(&[row], false).await.unwrap();

        let external = SnapshotReader::new(&store).read(&["CURRENCIES"]).await.unwrap();
        assert_eq!(external.values.len(), 1);
        assert!(external.values_for("UNTRACKED").is_none());
    }
}
