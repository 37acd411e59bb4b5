//! Immutable registry snapshots.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::model::{Concept, Value, ValueSet};
use crate::version::Version;

/// The registry at a point in time.
///
/// Snapshots are produced by [`RegistryBuilder::build`](crate::RegistryBuilder::build)
/// and never change afterwards; there is no mutable access to any entity.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(crate) kernel_version: Version,
    pub(crate) snapshot_id: String,
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) concepts: IndexMap<String, Concept>,
    pub(crate) value_sets: IndexMap<String, ValueSet>,
    pub(crate) values: Vec<Value>,
}

impl Snapshot {
    /// Registry version this snapshot was built for.
    pub fn kernel_version(&self) -> Version {
        self.kernel_version
    }

    /// Snapshot identity.
    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    /// When the snapshot was generated.
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Look up a concept by id.
    pub fn get_concept(&self, id: &str) -> Option<&Concept> {
        self.concepts.get(id)
    }

    /// Look up a value set by id (see [`ValueSet::id`]).
    pub fn get_value_set(&self, id: &str) -> Option<&ValueSet> {
        self.value_sets.get(id)
    }

    /// Look up a value by value set id and code.
    pub fn get_value(&self, value_set_id: &str, code: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|v| v.value_set_code == value_set_id && v.code == code)
    }

    /// All concepts, in registration order.
    pub fn list_concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    /// All value sets, in registration order.
    pub fn list_value_sets(&self) -> impl Iterator<Item = &ValueSet> {
        self.value_sets.values()
    }

    /// All values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Values belonging to one value set.
    pub fn values_for<'a, 'b>(&'a self, value_set_id: &'b str) -> impl Iterator<Item = &'a Value> + use<'a, 'b> {
        self.values
            .iter()
            .filter(move |v| v.value_set_code == value_set_id)
    }

    /// Concept ids as a set.
    pub fn concept_ids(&self) -> BTreeSet<&str> {
        self.concepts.keys().map(String::as_str).collect()
    }

    /// Value set ids as a set.
    pub fn value_set_ids(&self) -> BTreeSet<&str> {
        self.value_sets.keys().map(String::as_str).collect()
    }

    /// Codes of the values in one value set.
    pub fn value_codes(&self, value_set_id: &str) -> BTreeSet<&str> {
        self.values_for(value_set_id)
            .map(|v| v.code.as_str())
            .collect()
    }

    /// Number of concepts.
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    /// Number of value sets.
    pub fn value_set_count(&self) -> usize {
        self.value_sets.len()
    }

    /// Number of values.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// SHA-256 of the snapshot content (version and all entities), hex encoded.
    pub fn content_hash(&self) -> String {
        content_hash(
            self.kernel_version,
            &self.concepts,
            &self.value_sets,
            &self.values,
        )
    }
}

#[derive(Serialize)]
struct HashInput<'a> {
    version: String,
    concepts: Vec<&'a Concept>,
    value_sets: Vec<&'a ValueSet>,
    values: &'a [Value],
}

pub(crate) fn content_hash(
    version: Version,
    concepts: &IndexMap<String, Concept>,
    value_sets: &IndexMap<String, ValueSet>,
    values: &[Value],
) -> String {
    let input = HashInput {
        version: version.to_string(),
        concepts: concepts.values().collect(),
        value_sets: value_sets.values().collect(),
        values,
    };
    // Serializing plain structs and maps of strings cannot fail.
    let bytes = serde_json::to_vec(&input).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Derive a snapshot id from a content hash.
pub(crate) fn derive_snapshot_id(hash: &str) -> String {
    format!("snap_{}", &hash[..16.min(hash.len())])
}

#[cfg(test)]
mod tests {
    use crate::builder::RegistryBuilder;
    use crate::model::{Category, Concept, Domain, Value, ValueSet};
    use crate::version::Version;

    fn sample() -> crate::Snapshot {
        let mut builder = RegistryBuilder::new(Version::new(1, 0, 0));
        builder
            .register_concept(Concept::new(
                "CURRENCY",
                "Currency",
                Category::Attribute,
                Domain::Reference,
                "1.0.0",
            ))
            .unwrap();
        builder
            .register_value_set(
                ValueSet::new("CURRENCIES", Domain::Reference).for_concept("CURRENCY"),
            )
            .unwrap();
        builder.add_value(Value::new("CURRENCIES", "USD", "US Dollar"));
        builder.add_value(Value::new("CURRENCIES", "EUR", "Euro"));
        builder.build().unwrap()
    }

    #[test]
    fn test_lookups_return_none_for_unknown() {
        let snapshot = sample();
        assert!(snapshot.get_concept("CURRENCY").is_some());
        assert!(snapshot.get_concept("NOPE").is_none());
        assert!(snapshot.get_value_set("NOPE").is_none());
        assert!(snapshot.get_value("CURRENCIES", "JPY").is_none());
    }

    #[test]
    fn test_value_codes() {
        let snapshot = sample();
        let codes: Vec<_> = snapshot.value_codes("CURRENCIES").into_iter().collect();
        assert_eq!(codes, vec!["EUR", "USD"]);
        assert!(snapshot.value_codes("UNKNOWN").is_empty());
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = sample();
        let b = sample();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.snapshot_id(), b.snapshot_id());
        assert!(a.snapshot_id().starts_with("snap_"));
    }
}
