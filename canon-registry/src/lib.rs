//! # canon-registry
//!
//! The canonical metadata registry: domain concepts, allowed-value sets and
//! the values inside them.
//!
//! This crate provides:
//! - The registry entities ([`Concept`], [`ValueSet`], [`Value`])
//! - Identity enforcement at registration time ([`RegistryBuilder`])
//! - Immutable, versioned [`Snapshot`]s with side-effect-free lookups
//! - Strict `major.minor.patch` [`Version`] parsing and ordering
//! - Loading the canonical snapshot from its JSON [`Lockfile`]
//!
//! ## Example
//!
//! ```rust
//! use canon_registry::{Category, Concept, Domain, RegistryBuilder, Value, ValueSet, Version};
//!
//! let mut builder = RegistryBuilder::new(Version::new(1, 0, 0));
//! builder
//!     .register_concept(Concept::new(
//!         "CURRENCY",
//!         "Currency",
//!         Category::Attribute,
//!         Domain::Reference,
//!         "1.0.0",
//!     ))
//!     .unwrap();
//! builder
//!     .register_value_set(ValueSet::new("CURRENCIES", Domain::Reference).for_concept("CURRENCY"))
//!     .unwrap();
//! builder.add_value(Value::new("CURRENCIES", "USD", "US Dollar"));
//!
//! let snapshot = builder.build().unwrap();
//! assert!(snapshot.get_concept("CURRENCY").is_some());
//! assert!(snapshot.get_concept("INVOICE").is_none());
//! ```

pub mod builder;
pub mod error;
pub mod lockfile;
pub mod model;
pub mod snapshot;
pub mod version;

pub use builder::{RegistryBuilder, validate_values};
pub use error::{EntityKind, RegistryError, RegistryResult};
pub use lockfile::{LOCKFILE_NAME, Lockfile, load_snapshot};
pub use model::{Category, Concept, Domain, ID_SEPARATOR, Value, ValueSet, ValueSetKey};
pub use snapshot::Snapshot;
pub use version::{Version, compare_versions, parse_version};
