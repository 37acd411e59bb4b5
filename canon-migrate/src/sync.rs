//! Applying the canonical snapshot to an external store.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use canon_registry::Snapshot;

use crate::error::MigrateResult;
use crate::store::{ConceptRow, MetadataRow, RegistryStore, ValueRow, ValueSetRow};

/// Number of items written per entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounts {
    /// Concepts written.
    pub concepts: usize,
    /// Value sets written.
    pub value_sets: usize,
    /// Values written.
    pub values: usize,
}

impl ItemCounts {
    /// Total items.
    pub fn total(&self) -> usize {
        self.concepts + self.value_sets + self.values
    }
}

/// Report of a completed sync.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Items reconciled (the full canonical batch per entity kind).
    pub items: ItemCounts,
    /// Rows that actually changed.
    pub changed: ItemCounts,
    /// Rows deactivated because they are absent from the canonical snapshot.
    pub deactivated: ItemCounts,
}

/// Writes a canonical snapshot into a store.
///
/// Entities are written value sets first, then concepts, then values, and the
/// metadata row last so that a store never claims a version whose rows were
/// not fully written. The first failing batch aborts the sync.
pub struct Synchronizer<'a, S: RegistryStore + ?Sized> {
    store: &'a S,
    deactivate_missing: bool,
}

impl<'a, S: RegistryStore + ?Sized> Synchronizer<'a, S> {
    /// Create a synchronizer that deactivates rows absent from the snapshot.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            deactivate_missing: true,
        }
    }

    /// Whether rows absent from the snapshot are deactivated.
    pub fn deactivate_missing(mut self, deactivate: bool) -> Self {
        self.deactivate_missing = deactivate;
        self
    }

    /// Write the snapshot.
    pub async fn apply(&self, snapshot: &Snapshot) -> MigrateResult<SyncReport> {
        let value_sets: Vec<ValueSetRow> = snapshot.list_value_sets().map(Into::into).collect();
        let concepts: Vec<ConceptRow> = snapshot.list_concepts().map(Into::into).collect();
        let values: Vec<ValueRow> = snapshot.values().iter().map(Into::into).collect();

        let mut report = SyncReport::default();

        let outcome = self
            .store
            .upsert_value_sets(&value_sets, self.deactivate_missing)
            .await?;
        debug!(
            rows = value_sets.len(),
            changed = outcome.upserted,
            deactivated = outcome.deactivated,
            "Synced value sets"
        );
        report.items.value_sets = value_sets.len();
        report.changed.value_sets = outcome.upserted;
        report.deactivated.value_sets = outcome.deactivated;

        let outcome = self
            .store
            .upsert_concepts(&concepts, self.deactivate_missing)
            .await?;
        debug!(
            rows = concepts.len(),
            changed = outcome.upserted,
            deactivated = outcome.deactivated,
            "Synced concepts"
        );
        report.items.concepts = concepts.len();
        report.changed.concepts = outcome.upserted;
        report.deactivated.concepts = outcome.deactivated;

        let outcome = self
            .store
            .upsert_values(&values, self.deactivate_missing)
            .await?;
        debug!(
            rows = values.len(),
            changed = outcome.upserted,
            deactivated = outcome.deactivated,
            "Synced values"
        );
        report.items.values = values.len();
        report.changed.values = outcome.upserted;
        report.deactivated.values = outcome.deactivated;

        self.store
            .upsert_metadata(&MetadataRow::for_snapshot(snapshot))
            .await?;

        info!(
            version = %snapshot.kernel_version(),
            snapshot_id = %snapshot.snapshot_id(),
            changed = report.changed.total(),
            deactivated = report.deactivated.total(),
            "Synced canonical snapshot"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use canon_registry::{Category, Concept, Domain, RegistryBuilder, Value, ValueSet, Version};

    fn snapshot(extra_concept: bool) -> Snapshot {
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
        if extra_concept {
            builder
                .register_concept(Concept::new(
                    "CLAIM",
                    "Claim",
                    Category::Entity,
                    Domain::Claims,
                    "1.0.0",
                ))
                .unwrap();
        }
        builder
            .register_value_set(ValueSet::new("CURRENCIES", Domain::Reference))
            .unwrap();
        builder.add_value(Value::new("CURRENCIES", "USD", "US Dollar"));
        builder.add_value(Value::new("CURRENCIES", "EUR", "Euro"));
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_apply_writes_everything() {
        let store = MemoryStore::new();
        let snapshot = snapshot(true);
        let report = Synchronizer::new(&store).apply(&snapshot).await.unwrap();

        assert_eq!(
            report.items,
            ItemCounts {
                concepts: 2,
                value_sets: 1,
                values: 2
            }
        );
        let metadata = store.read_metadata().await.unwrap().unwrap();
        assert_eq!(metadata.kernel_version, "1.0.0");
        assert_eq!(metadata.snapshot_id, snapshot.snapshot_id());
        assert!(metadata.is_current);
    }

    #[tokio::test]
    async fn test_apply_twice_is_idempotent() {
        let store = MemoryStore::new();
        let snapshot = snapshot(true);
        let synchronizer = Synchronizer::new(&store);

        synchronizer.apply(&snapshot).await.unwrap();
        let counts_before = store.row_counts();
        let ids_before = store.read_concept_ids().await.unwrap();

        let second = synchronizer.apply(&snapshot).await.unwrap();
        assert_eq!(second.changed.total(), 0);
        assert_eq!(second.deactivated.total(), 0);
        assert_eq!(store.row_counts(), counts_before);
        assert_eq!(store.read_concept_ids().await.unwrap(), ids_before);
    }

    #[tokio::test]
    async fn test_apply_deactivates_removed_concepts() {
        let store = MemoryStore::new();
        Synchronizer::new(&store).apply(&snapshot(true)).await.unwrap();

        let report = Synchronizer::new(&store).apply(&snapshot(false)).await.unwrap();
        assert_eq!(report.deactivated.concepts, 1);
        assert_eq!(store.read_concept_ids().await.unwrap(), vec!["INVOICE"]);
    }

    #[tokio::test]
    async fn test_apply_without_deactivation() {
        let store = MemoryStore::new();
        Synchronizer::new(&store).apply(&snapshot(true)).await.unwrap();

        let report = Synchronizer::new(&store)
            .deactivate_missing(false)
            .apply(&snapshot(false))
            .await
            .unwrap();
        assert_eq!(report.deactivated.total(), 0);
        assert_eq!(store.read_concept_ids().await.unwrap().len(), 2);
    }
}
