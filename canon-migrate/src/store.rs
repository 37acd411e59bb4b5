//! External store surface.
//!
//! The external store is the persisted mirror of the canonical snapshot
//! (typically a database). The core talks to it only through
//! [`RegistryStore`]: four reads and four batched upserts. Rows are decoded
//! into typed structs at this boundary; nothing past it sees untyped maps.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use canon_registry::{Category, Concept, Domain, Snapshot, Value, ValueSet};

use crate::error::MigrateResult;

/// Registry metadata row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    /// Registry version the store claims to hold.
    pub kernel_version: String,
    /// Snapshot identity the store was built from.
    pub snapshot_id: String,
    /// When the row was written.
    pub applied_at: DateTime<Utc>,
    /// Whether this is the store's current metadata row.
    pub is_current: bool,
}

impl MetadataRow {
    /// Current metadata row for a snapshot.
    pub fn for_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            kernel_version: snapshot.kernel_version().to_string(),
            snapshot_id: snapshot.snapshot_id().to_string(),
            applied_at: Utc::now(),
            is_current: true,
        }
    }
}

/// Concept row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptRow {
    /// Concept id.
    pub concept_id: String,
    /// Human label.
    pub label: String,
    /// Category.
    pub category: Category,
    /// Domain.
    pub domain: Domain,
    /// Description.
    pub description: String,
    /// Concept definition version.
    pub version: String,
    /// Whether the row is active.
    pub is_active: bool,
}

impl From<&Concept> for ConceptRow {
    fn from(concept: &Concept) -> Self {
        Self {
            concept_id: concept.id.clone(),
            label: concept.label.clone(),
            category: concept.category,
            domain: concept.domain,
            description: concept.description.clone(),
            version: concept.version.clone(),
            is_active: true,
        }
    }
}

/// Value set row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetRow {
    /// Value set id (`CODE` or `CODE@JURISDICTION`).
    pub value_set_id: String,
    /// Set code.
    pub code: String,
    /// Bound concept.
    pub concept_id: Option<String>,
    /// Jurisdiction.
    pub jurisdiction: Option<String>,
    /// Domain.
    pub domain: Domain,
    /// Description.
    pub description: String,
    /// Whether the row is active.
    pub is_active: bool,
}

impl From<&ValueSet> for ValueSetRow {
    fn from(set: &ValueSet) -> Self {
        Self {
            value_set_id: set.id(),
            code: set.code.clone(),
            concept_id: set.concept_id.clone(),
            jurisdiction: set.jurisdiction.clone(),
            domain: set.domain,
            description: set.description.clone(),
            is_active: true,
        }
    }
}

/// Value row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRow {
    /// Value id (`VALUE_SET:CODE`).
    pub value_id: String,
    /// Value code.
    pub value_key: String,
    /// Owning value set id.
    pub value_set_id: String,
    /// Label.
    pub label: String,
    /// Description.
    pub description: Option<String>,
    /// Sort order.
    pub sort_order: i32,
    /// Provenance metadata.
    pub metadata: BTreeMap<String, String>,
    /// Whether the row is active.
    pub is_active: bool,
}

impl From<&Value> for ValueRow {
    fn from(value: &Value) -> Self {
        Self {
            value_id: value.id(),
            value_key: value.code.clone(),
            value_set_id: value.value_set_code.clone(),
            label: value.label.clone(),
            description: value.description.clone(),
            sort_order: value.sort_order,
            metadata: value.metadata.clone(),
            is_active: true,
        }
    }
}

/// Identity projection of a stored value, as returned by reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredValue {
    /// Value id.
    pub value_id: String,
    /// Value code.
    pub value_key: String,
    /// Owning value set id.
    pub value_set_id: String,
}

/// Outcome of a batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows inserted or updated.
    pub upserted: usize,
    /// Rows deactivated because they were absent from the batch.
    pub deactivated: usize,
}

/// Read/write surface of the external store.
///
/// Reads return active rows only. Every upsert is keyed by entity id; with
/// `deactivate_missing` set, active rows whose id is absent from the batch are
/// deactivated, which makes re-applying the same batch a no-op.
#[async_trait::async_trait]
pub trait RegistryStore: Send + Sync {
    /// Read the current metadata row, if any.
    async fn read_metadata(&self) -> MigrateResult<Option<MetadataRow>>;

    /// Read active concept ids.
    async fn read_concept_ids(&self) -> MigrateResult<Vec<String>>;

    /// Read active value set ids.
    async fn read_value_set_ids(&self) -> MigrateResult<Vec<String>>;

    /// Read active values, optionally restricted to one value set.
    async fn read_values(&self, value_set_id: Option<&str>) -> MigrateResult<Vec<StoredValue>>;

    /// Write a metadata row and make it the only current one.
    async fn upsert_metadata(&self, row: &MetadataRow) -> MigrateResult<()>;

    /// Upsert a batch of concepts.
    async fn upsert_concepts(
        &self,
        batch: &[ConceptRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome>;

    /// Upsert a batch of value sets.
    async fn upsert_value_sets(
        &self,
        batch: &[ValueSetRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome>;

    /// Upsert a batch of values.
    async fn upsert_values(
        &self,
        batch: &[ValueRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome>;
}

/// Rows with an id and an active flag.
trait Keyed: Clone + PartialEq {
    fn key(&self) -> &str;
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
}

macro_rules! impl_keyed {
    ($ty:ty, $field:ident) => {
        impl Keyed for $ty {
            fn key(&self) -> &str {
                &self.$field
            }
            fn is_active(&self) -> bool {
                self.is_active
            }
            fn set_active(&mut self, active: bool) {
                self.is_active = active;
            }
        }
    };
}

impl_keyed!(ConceptRow, concept_id);
impl_keyed!(ValueSetRow, value_set_id);
impl_keyed!(ValueRow, value_id);

fn upsert_table<R: Keyed>(
    table: &mut IndexMap<String, R>,
    batch: &[R],
    deactivate_missing: bool,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for row in batch {
        let mut row = row.clone();
        row.set_active(true);
        match table.get_mut(row.key()) {
            Some(existing) if *existing == row => {}
            Some(existing) => {
                *existing = row;
                outcome.upserted += 1;
            }
            None => {
                table.insert(row.key().to_string(), row);
                outcome.upserted += 1;
            }
        }
    }

    if deactivate_missing {
        let keep: HashSet<&str> = batch.iter().map(Keyed::key).collect();
        for (id, row) in table.iter_mut() {
            if row.is_active() && !keep.contains(id.as_str()) {
                row.set_active(false);
                outcome.deactivated += 1;
            }
        }
    }

    outcome
}

#[derive(Debug, Default)]
struct MemoryState {
    metadata: Vec<MetadataRow>,
    concepts: IndexMap<String, ConceptRow>,
    value_sets: IndexMap<String, ValueSetRow>,
    values: IndexMap<String, ValueRow>,
}

/// In-process store.
///
/// Holds rows in memory behind a lock; useful for previews and tests. Rows are
/// never deleted, only deactivated, matching the database store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows per table, including inactive ones: `(concepts, value sets, values)`.
    pub fn row_counts(&self) -> (usize, usize, usize) {
        let state = self.state.read();
        (
            state.concepts.len(),
            state.value_sets.len(),
            state.values.len(),
        )
    }

    /// Number of metadata rows written so far.
    pub fn metadata_history_len(&self) -> usize {
        self.state.read().metadata.len()
    }

    /// Overwrite the current metadata row in place, without history.
    pub fn set_metadata(&self, row: MetadataRow) {
        let mut state = self.state.write();
        state.metadata.clear();
        state.metadata.push(row);
    }
}

#[async_trait::async_trait]
impl RegistryStore for MemoryStore {
    async fn read_metadata(&self) -> MigrateResult<Option<MetadataRow>> {
        let state = self.state.read();
        let current = state.metadata.iter().rev().find(|m| m.is_current);
        Ok(current.or_else(|| state.metadata.last()).cloned())
    }

    async fn read_concept_ids(&self) -> MigrateResult<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .concepts
            .values()
            .filter(|r| r.is_active)
            .map(|r| r.concept_id.clone())
            .collect())
    }

    async fn read_value_set_ids(&self) -> MigrateResult<Vec<String>> {
        let state = self.state.read();
        Ok(state
            .value_sets
            .values()
            .filter(|r| r.is_active)
            .map(|r| r.value_set_id.clone())
            .collect())
    }

    async fn read_values(&self, value_set_id: Option<&str>) -> MigrateResult<Vec<StoredValue>> {
        let state = self.state.read();
        Ok(state
            .values
            .values()
            .filter(|r| r.is_active)
            .filter(|r| value_set_id.is_none_or(|id| r.value_set_id == id))
            .map(|r| StoredValue {
                value_id: r.value_id.clone(),
                value_key: r.value_key.clone(),
                value_set_id: r.value_set_id.clone(),
            })
            .collect())
    }

    async fn upsert_metadata(&self, row: &MetadataRow) -> MigrateResult<()> {
        let mut state = self.state.write();
        for existing in &mut state.metadata {
            existing.is_current = false;
        }
        let position = state.metadata.iter().position(|m| {
            m.kernel_version == row.kernel_version && m.snapshot_id == row.snapshot_id
        });
        match position {
            Some(index) => state.metadata[index] = row.clone(),
            None => state.metadata.push(row.clone()),
        }
        Ok(())
    }

    async fn upsert_concepts(
        &self,
        batch: &[ConceptRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome> {
        let mut state = self.state.write();
        Ok(upsert_table(&mut state.concepts, batch, deactivate_missing))
    }

    async fn upsert_value_sets(
        &self,
        batch: &[ValueSetRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome> {
        let mut state = self.state.write();
        Ok(upsert_table(&mut state.value_sets, batch, deactivate_missing))
    }

    async fn upsert_values(
        &self,
        batch: &[ValueRow],
        deactivate_missing: bool,
    ) -> MigrateResult<BatchOutcome> {
        let mut state = self.state.write();
        Ok(upsert_table(&mut state.values, batch, deactivate_missing))
    }
}
