//! Registry entities: concepts, value sets and values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Category of a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// A business entity (e.g. INVOICE).
    Entity,
    /// An attribute of an entity.
    Attribute,
    /// An operation performed on entities.
    Operation,
    /// A relationship between entities.
    Relationship,
}

impl Category {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Entity => "ENTITY",
            Category::Attribute => "ATTRIBUTE",
            Category::Operation => "OPERATION",
            Category::Relationship => "RELATIONSHIP",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENTITY" => Ok(Category::Entity),
            "ATTRIBUTE" => Ok(Category::Attribute),
            "OPERATION" => Ok(Category::Operation),
            "RELATIONSHIP" => Ok(Category::Relationship),
            other => Err(format!("unknown concept category '{}'", other)),
        }
    }
}

/// Business module a concept or value set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Domain {
    /// Cross-cutting vocabulary.
    Core,
    /// Accounting and general ledger.
    Finance,
    /// Vendors and purchasing.
    Procurement,
    /// Expense and insurance claims.
    Claims,
    /// Document management.
    Documents,
    /// Regulatory and audit.
    Compliance,
    /// Tax codes and rates.
    Tax,
    /// Externally sourced reference data (ISO codes, charts of accounts).
    Reference,
}

impl Domain {
    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Core => "CORE",
            Domain::Finance => "FINANCE",
            Domain::Procurement => "PROCUREMENT",
            Domain::Claims => "CLAIMS",
            Domain::Documents => "DOCUMENTS",
            Domain::Compliance => "COMPLIANCE",
            Domain::Tax => "TAX",
            Domain::Reference => "REFERENCE",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CORE" => Ok(Domain::Core),
            "FINANCE" => Ok(Domain::Finance),
            "PROCUREMENT" => Ok(Domain::Procurement),
            "CLAIMS" => Ok(Domain::Claims),
            "DOCUMENTS" => Ok(Domain::Documents),
            "COMPLIANCE" => Ok(Domain::Compliance),
            "TAX" => Ok(Domain::Tax),
            "REFERENCE" => Ok(Domain::Reference),
            other => Err(format!("unknown domain '{}'", other)),
        }
    }
}

/// A named domain noun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    /// Stable, globally unique identifier (e.g. `INVOICE`).
    pub id: String,
    /// Human label.
    pub label: String,
    /// Concept category.
    pub category: Category,
    /// Owning business module.
    pub domain: Domain,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Semantic version of the concept definition.
    pub version: String,
}

impl Concept {
    /// Create a concept with an empty description.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        category: Category,
        domain: Domain,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            category,
            domain,
            description: String::new(),
            version: version.into(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Uniqueness key of a value set: its scope (owning concept, or its own code)
/// and jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueSetKey {
    /// Concept id when the set is bound to a concept, otherwise the set code.
    pub scope: String,
    /// Jurisdiction, if the set is jurisdiction-specific.
    pub jurisdiction: Option<String>,
}

impl fmt::Display for ValueSetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.jurisdiction {
            Some(j) => write!(f, "{}@{}", self.scope, j),
            None => f.write_str(&self.scope),
        }
    }
}

/// A named enumeration container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSet {
    /// Set code (e.g. `CURRENCIES`).
    pub code: String,
    /// Concept this set enumerates, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<String>,
    /// Jurisdiction scope (e.g. `US`, `DE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    /// Owning business module.
    pub domain: Domain,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
}

impl ValueSet {
    /// Create an unscoped value set.
    pub fn new(code: impl Into<String>, domain: Domain) -> Self {
        Self {
            code: code.into(),
            concept_id: None,
            jurisdiction: None,
            domain,
            description: String::new(),
        }
    }

    /// Bind the set to a concept.
    pub fn for_concept(mut self, concept_id: impl Into<String>) -> Self {
        self.concept_id = Some(concept_id.into());
        self
    }

    /// Scope the set to a jurisdiction.
    pub fn in_jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.jurisdiction = Some(jurisdiction.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Registry uniqueness key.
    pub fn key(&self) -> ValueSetKey {
        ValueSetKey {
            scope: self.concept_id.clone().unwrap_or_else(|| self.code.clone()),
            jurisdiction: self.jurisdiction.clone(),
        }
    }

    /// Identifier used by values and by the external store.
    ///
    /// `CODE` for unscoped sets, `CODE@JURISDICTION` otherwise.
    pub fn id(&self) -> String {
        match &self.jurisdiction {
            Some(j) => format!("{}@{}", self.code, j),
            None => self.code.clone(),
        }
    }
}

/// Separator between the value set id and the code in a value id.
pub const ID_SEPARATOR: char = ':';

/// A single allowed member of a value set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    /// Code, unique within its value set.
    pub code: String,
    /// Identifier of the owning value set (see [`ValueSet::id`]).
    pub value_set_code: String,
    /// Human label.
    pub label: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display ordering within the set.
    #[serde(default)]
    pub sort_order: i32,
    /// Provenance metadata (source, jurisdiction, extraction timestamp).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Value {
    /// Create a value.
    pub fn new(
        value_set_code: impl Into<String>,
        code: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            value_set_code: value_set_code.into(),
            label: label.into(),
            description: None,
            sort_order: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the sort order.
    pub fn sort_order(mut self, order: i32) -> Self {
        self.sort_order = order;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Store identifier: `VALUE_SET:CODE`.
    pub fn id(&self) -> String {
        format!("{}{}{}", self.value_set_code, ID_SEPARATOR, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_set_key_defaults_to_code() {
        let set = ValueSet::new("CURRENCIES", Domain::Reference);
        assert_eq!(set.key().scope, "CURRENCIES");
        assert_eq!(set.id(), "CURRENCIES");
    }

    #[test]
    fn test_value_set_key_uses_concept_and_jurisdiction() {
        let set = ValueSet::new("VAT_RATES", Domain::Tax)
            .for_concept("TAX_RATE")
            .in_jurisdiction("DE");
        assert_eq!(set.key().to_string(), "TAX_RATE@DE");
        assert_eq!(set.id(), "VAT_RATES@DE");
    }

    #[test]
    fn test_value_id() {
        let value = Value::new("CURRENCIES", "EUR", "Euro").sort_order(2);
        assert_eq!(value.id(), "CURRENCIES:EUR");
    }

    #[test]
    fn test_category_round_trip() {
        for c in [
            Category::Entity,
            Category::Attribute,
            Category::Operation,
            Category::Relationship,
        ] {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("THING".parse::<Category>().is_err());
    }

    #[test]
    fn test_concept_serde_camel_case() {
        let json = r#"{"id":"INVOICE","label":"Invoice","category":"ENTITY","domain":"FINANCE","version":"1.0.0"}"#;
        let concept: Concept = serde_json::from_str(json).unwrap();
        assert_eq!(concept.domain, Domain::Finance);
        assert!(concept.description.is_empty());
    }
}
