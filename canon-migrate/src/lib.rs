//! # canon-migrate
//!
//! Versioning and drift reconciliation for the canonical registry.
//!
//! This crate provides functionality for:
//! - Deciding whether a version transition is breaking, safe and whether it
//!   needs a migration (the compatibility matrix)
//! - Planning and executing migrations of an external store, with dry runs
//!   and forced rollbacks
//! - Reading the current state of an external store and validating it
//!   against the canonical snapshot
//! - Classifying drift and rendering Markdown drift reports
//! - Generating idempotent PostgreSQL reconciliation scripts
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────────┐
//! │   Snapshot   │────▶│ Compat Matrix  │────▶│ MigrationEngine │
//! └──────────────┘     └────────────────┘     └─────────────────┘
//!        │                                             │
//!        │             ┌────────────────┐              ▼
//!        ├────────────▶│ StateValidator │      ┌──────────────┐
//!        │             └────────────────┘      │ Synchronizer │
//!        │                     │               └──────────────┘
//!        │                     ▼                       │
//!        │             ┌────────────────┐              ▼
//!        │             │ DriftDetector  │      ┌──────────────┐
//!        │             └────────────────┘      │ RegistryStore│
//!        │                                     └──────────────┘
//!        └────────────▶ SyncSqlGenerator (scripts for CI / manual apply)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canon_migrate::{DriftDetector, MemoryStore, MigrationEngine, MigrationOptions};
//!
//! async fn run(snapshot: canon_registry::Snapshot) -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let engine = MigrationEngine::new(Arc::new(snapshot), store.clone());
//!
//!     let result = engine
//!         .execute_migration("1.0.0", "2.0.0", MigrationOptions::new().dry_run(true))
//!         .await;
//!     println!("{}", result.message);
//!
//!     let report = DriftDetector::new().detect(engine.snapshot(), &*store).await?;
//!     report.write("drift-report.md").await?;
//!     Ok(())
//! }
//! ```

pub mod compat;
pub mod drift;
pub mod engine;
pub mod error;
pub mod introspect;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sql;
pub mod store;
pub mod sync;
pub mod validate;

// Re-exports
pub use compat::{
    CompatibilityMatrix, CompatibilityOverrides, CompatibilityRecord, OVERRIDES_FILE_NAME,
    VersionChange,
};
pub use drift::{DriftDetails, DriftDetector, DriftReport, DriftResult, DriftType, ValueRef};
pub use engine::{MigrationEngine, MigrationOptions, MigrationResult, MigrationValidation};
pub use error::{MigrateResult, MigrationError};
pub use introspect::{ExternalStoreSnapshot, SnapshotReader};
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use sql::{BatchSql, SyncSql, SyncSqlGenerator};
pub use store::{
    BatchOutcome, ConceptRow, MemoryStore, MetadataRow, RegistryStore, StoredValue, ValueRow,
    ValueSetRow,
};
pub use sync::{ItemCounts, SyncReport, Synchronizer};
pub use validate::{Finding, Severity, StateValidator, ValidationReport};
