//! Canonical snapshot construction.
//!
//! A [`RegistryBuilder`] is created once per process from the canonical
//! source, filled with concepts, value sets and values, then frozen into a
//! [`Snapshot`]. Identity rules are enforced as records are registered:
//!
//! - concept ids are globally unique
//! - value sets are unique per `(concept id or code, jurisdiction)`
//! - values are unique per `(value set, code)` and must reference a declared set
//! - value set codes, jurisdictions and value codes never contain `:`, the
//!   separator of store value ids
//!
//! Any violation aborts the build.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::{EntityKind, RegistryError, RegistryResult};
use crate::model::{Concept, ID_SEPARATOR, Value, ValueSet, ValueSetKey};
use crate::snapshot::{Snapshot, content_hash, derive_snapshot_id};
use crate::version::Version;

/// Builder for a canonical [`Snapshot`].
#[derive(Debug)]
pub struct RegistryBuilder {
    kernel_version: Version,
    snapshot_id: Option<String>,
    generated_at: Option<DateTime<Utc>>,
    concepts: IndexMap<String, Concept>,
    value_sets: IndexMap<String, ValueSet>,
    value_set_keys: HashSet<ValueSetKey>,
    values: Vec<Value>,
}

impl RegistryBuilder {
    /// Create an empty builder for the given registry version.
    pub fn new(kernel_version: Version) -> Self {
        Self {
            kernel_version,
            snapshot_id: None,
            generated_at: None,
            concepts: IndexMap::new(),
            value_sets: IndexMap::new(),
            value_set_keys: HashSet::new(),
            values: Vec::new(),
        }
    }

    /// Use an explicit snapshot id instead of deriving one from the content.
    pub fn with_snapshot_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.snapshot_id = if id.trim().is_empty() { None } else { Some(id) };
        self
    }

    /// Set the generation timestamp (defaults to build time).
    pub fn with_generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Register a concept.
    ///
    /// Fails with [`RegistryError::DuplicateIdentifier`] if the id is taken.
    pub fn register_concept(&mut self, def: Concept) -> RegistryResult<&Concept> {
        if self.concepts.contains_key(&def.id) {
            return Err(RegistryError::duplicate(EntityKind::Concept, def.id));
        }
        let id = def.id.clone();
        let (index, _) = self.concepts.insert_full(id, def);
        Ok(&self.concepts[index])
    }

    /// Register a value set.
    ///
    /// Fails with [`RegistryError::DuplicateIdentifier`] if another set has the
    /// same `(concept id or code, jurisdiction)` key or the same id, and with
    /// [`RegistryError::InvalidIdentifier`] if its id contains `:`.
    pub fn register_value_set(&mut self, def: ValueSet) -> RegistryResult<&ValueSet> {
        let key = def.key();
        let id = def.id();
        if def.code.contains(ID_SEPARATOR)
            || def.jurisdiction.as_deref().is_some_and(|j| j.contains(ID_SEPARATOR))
        {
            return Err(RegistryError::invalid_identifier(
                EntityKind::ValueSet,
                id,
                format!("must not contain '{}'", ID_SEPARATOR),
            ));
        }
        if self.value_set_keys.contains(&key) {
            return Err(RegistryError::duplicate(EntityKind::ValueSet, key.to_string()));
        }
        if self.value_sets.contains_key(&id) {
            return Err(RegistryError::duplicate(EntityKind::ValueSet, id));
        }
        self.value_set_keys.insert(key);
        let (index, _) = self.value_sets.insert_full(id, def);
        Ok(&self.value_sets[index])
    }

    /// Queue a value. Values are validated as a whole by [`build`](Self::build).
    pub fn add_value(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Queue several values.
    pub fn add_values(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    /// Number of concepts registered so far.
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    /// Freeze the builder into a snapshot.
    ///
    /// The first invalid value aborts the build.
    pub fn build(self) -> RegistryResult<Snapshot> {
        let declared: HashSet<&str> = self.value_sets.keys().map(String::as_str).collect();
        if let Some(err) = validate_values(&self.values, &declared).into_iter().next() {
            return Err(err);
        }

        let snapshot_id = match self.snapshot_id {
            Some(id) => id,
            None => derive_snapshot_id(&content_hash(
                self.kernel_version,
                &self.concepts,
                &self.value_sets,
                &self.values,
            )),
        };

        debug!(
            version = %self.kernel_version,
            snapshot_id = %snapshot_id,
            concepts = self.concepts.len(),
            value_sets = self.value_sets.len(),
            values = self.values.len(),
            "Built registry snapshot"
        );

        Ok(Snapshot {
            kernel_version: self.kernel_version,
            snapshot_id,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
            concepts: self.concepts,
            value_sets: self.value_sets,
            values: self.values,
        })
    }
}

/// Validate a list of values against a set of declared value set ids.
///
/// Every problem is reported, in input order. Used directly by template
/// tooling and by [`RegistryBuilder::build`], which fails on the first one.
pub fn validate_values(values: &[Value], declared: &HashSet<&str>) -> Vec<RegistryError> {
    let mut errors = Vec::new();
    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();

    for (index, value) in values.iter().enumerate() {
        if value.code.trim().is_empty() {
            errors.push(RegistryError::invalid_value(index, "code", "must not be empty"));
            continue;
        }
        if value.code.contains(ID_SEPARATOR) {
            errors.push(RegistryError::invalid_value(
                index,
                "code",
                format!("must not contain '{}'", ID_SEPARATOR),
            ));
            continue;
        }
        if value.value_set_code.trim().is_empty() {
            errors.push(RegistryError::invalid_value(
                index,
                "valueSetCode",
                "must not be empty",
            ));
            continue;
        }
        if !declared.contains(value.value_set_code.as_str()) {
            errors.push(RegistryError::invalid_value(
                index,
                "valueSetCode",
                format!("references undeclared value set '{}'", value.value_set_code),
            ));
            continue;
        }

        let key = (value.value_set_code.as_str(), value.code.as_str());
        if let Some(first) = seen.get(&key) {
            errors.push(RegistryError::invalid_value(
                index,
                "code",
                format!("duplicates '{}' first declared at index {}", value.id(), first),
            ));
        } else {
            seen.insert(key, index);
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Domain};

    fn builder() -> RegistryBuilder {
        RegistryBuilder::new(Version::new(1, 0, 0))
    }

    fn invoice() -> Concept {
        Concept::new("INVOICE", "Invoice", Category::Entity, Domain::Finance, "1.0.0")
    }

    #[test]
    fn test_register_concept_returns_definition_unchanged() {
        let mut b = builder();
        let def = invoice().with_description("A bill");
        let stored = b.register_concept(def.clone()).unwrap();
        assert_eq!(stored, &def);
    }

    #[test]
    fn test_duplicate_concept_fails() {
        let mut b = builder();
        b.register_concept(invoice()).unwrap();
        let err = b.register_concept(invoice()).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateIdentifier {
                kind: EntityKind::Concept,
                ref id
            } if id == "INVOICE"
        ));
        assert_eq!(b.concept_count(), 1);
    }

    #[test]
    fn test_value_set_unique_per_jurisdiction() {
        let mut b = builder();
        b.register_value_set(ValueSet::new("VAT", Domain::Tax).in_jurisdiction("DE"))
            .unwrap();
        b.register_value_set(ValueSet::new("VAT", Domain::Tax).in_jurisdiction("FR"))
            .unwrap();
        let err = b
            .register_value_set(ValueSet::new("VAT", Domain::Tax).in_jurisdiction("DE"))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateIdentifier {
                kind: EntityKind::ValueSet,
                ..
            }
        ));
    }

    #[test]
    fn test_value_set_keyed_by_concept() {
        let mut b = builder();
        b.register_value_set(ValueSet::new("STATUS_A", Domain::Core).for_concept("STATUS"))
            .unwrap();
        let err = b
            .register_value_set(ValueSet::new("STATUS_B", Domain::Core).for_concept("STATUS"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate value set identifier 'STATUS'");
    }

    #[test]
    fn test_build_rejects_duplicate_value() {
        let mut b = builder();
        b.register_value_set(ValueSet::new("CURRENCIES", Domain::Reference))
            .unwrap();
        b.add_value(Value::new("CURRENCIES", "USD", "US Dollar"));
        b.add_value(Value::new("CURRENCIES", "USD", "Dollar again"));
        let err = b.build().unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidValueShape { index: 1, field: "code", .. }
        ));
    }

    #[test]
    fn test_value_set_code_with_separator_rejected() {
        let mut b = builder();
        let err = b
            .register_value_set(ValueSet::new("A:B", Domain::Core))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidIdentifier {
                kind: EntityKind::ValueSet,
                ref id,
                ..
            } if id == "A:B"
        ));

        let err = b
            .register_value_set(ValueSet::new("VAT", Domain::Tax).in_jurisdiction("EU:DE"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_value_ids_cannot_collide() {
        // ("A", "B:C") and ("A:B", "C") would both map to the store id "A:B:C".
        let mut b = builder();
        b.register_value_set(ValueSet::new("A", Domain::Core)).unwrap();
        assert!(b.register_value_set(ValueSet::new("A:B", Domain::Core)).is_err());

        b.add_value(Value::new("A", "B:C", "Colliding"));
        let err = b.build().unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidValueShape { index: 0, field: "code", .. }
        ));
    }

    #[test]
    fn test_build_rejects_undeclared_value_set() {
        let mut b = builder();
        b.add_value(Value::new("MISSING", "X", "X"));
        let err = b.build().unwrap_err();
        assert!(err.to_string().contains("undeclared value set 'MISSING'"));
    }

    #[test]
    fn test_validate_values_accumulates() {
        let declared: HashSet<&str> = ["CURRENCIES"].into_iter().collect();
        let values = vec![
            Value::new("CURRENCIES", "", "Empty"),
            Value::new("CURRENCIES", "USD", "US Dollar"),
            Value::new("", "EUR", "Euro"),
            Value::new("CURRENCIES", "USD", "Duplicate"),
            Value::new("COUNTRIES", "US", "United States"),
        ];

        let errors = validate_values(&values, &declared);
        let indexes: Vec<usize> = errors
            .iter()
            .map(|e| match e {
                RegistryError::InvalidValueShape { index, .. } => *index,
                other => panic!("unexpected error {other}"),
            })
            .collect();
        assert_eq!(indexes, vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_explicit_snapshot_id_kept() {
        let snapshot = builder().with_snapshot_id("snap_manual").build().unwrap();
        assert_eq!(snapshot.snapshot_id(), "snap_manual");
    }

    #[test]
    fn test_blank_snapshot_id_is_derived() {
        let snapshot = builder().with_snapshot_id("  ").build().unwrap();
        assert!(snapshot.snapshot_id().starts_with("snap_"));
    }
}
