//! Comparing an external store against the canonical snapshot.
//!
//! Validation never stops at the first problem: every difference becomes a
//! typed [`Finding`], and both the rendered messages and the drift
//! classification are derived from the same findings.
//!
//! | Check                 | Missing in store | Extra in store |
//! |-----------------------|------------------|----------------|
//! | metadata row          | error            | -              |
//! | version / snapshot id | error (mismatch) | -              |
//! | concepts              | error            | warning        |
//! | value sets            | error            | warning        |
//! | values (per set)      | error            | warning        |
//!
//! A metadata row that matches but is not flagged current is a warning.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use canon_registry::Snapshot;

use crate::error::MigrateResult;
use crate::introspect::{ExternalStoreSnapshot, SnapshotReader};
use crate::store::RegistryStore;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be fixed; makes the store invalid.
    Error,
    /// Informational; never affects validity.
    Warning,
}

/// A single difference between the store and the canonical snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// The store has no metadata row.
    MetadataMissing,
    /// The store claims a different registry version.
    VersionMismatch {
        /// Canonical version.
        expected: String,
        /// Version held by the store.
        actual: String,
    },
    /// The store was built from a different snapshot.
    SnapshotMismatch {
        /// Canonical snapshot id.
        expected: String,
        /// Snapshot id held by the store.
        actual: String,
    },
    /// The metadata row matches but is not flagged current.
    StaleMetadata {
        /// Snapshot id of the row.
        snapshot_id: String,
    },
    /// A canonical concept is absent from the store.
    MissingConcept {
        /// Concept id.
        id: String,
    },
    /// The store holds a concept the canonical snapshot does not know.
    ExtraConcept {
        /// Concept id.
        id: String,
    },
    /// A canonical value set is absent from the store.
    MissingValueSet {
        /// Value set id.
        id: String,
    },
    /// The store holds a value set the canonical snapshot does not know.
    ExtraValueSet {
        /// Value set id.
        id: String,
    },
    /// A canonical value is absent from the store.
    MissingValue {
        /// Value set id.
        value_set: String,
        /// Value code.
        code: String,
    },
    /// The store holds a value the canonical snapshot does not know.
    ExtraValue {
        /// Value set id.
        value_set: String,
        /// Value code.
        code: String,
    },
}

impl Finding {
    /// Severity of this finding.
    pub fn severity(&self) -> Severity {
        match self {
            Finding::StaleMetadata { .. }
            | Finding::ExtraConcept { .. }
            | Finding::ExtraValueSet { .. }
            | Finding::ExtraValue { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Check if this finding is an error.
    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::MetadataMissing => write!(f, "Kernel metadata not found in external store"),
            Finding::VersionMismatch { expected, actual } => {
                write!(f, "Version mismatch: expected {}, found {}", expected, actual)
            }
            Finding::SnapshotMismatch { expected, actual } => {
                write!(f, "Snapshot mismatch: expected {}, found {}", expected, actual)
            }
            Finding::StaleMetadata { snapshot_id } => {
                write!(f, "Metadata for snapshot {} is not marked current", snapshot_id)
            }
            Finding::MissingConcept { id } => write!(f, "Missing concept: {}", id),
            Finding::ExtraConcept { id } => {
                write!(f, "Extra concept not in canonical snapshot: {}", id)
            }
            Finding::MissingValueSet { id } => write!(f, "Missing value set: {}", id),
            Finding::ExtraValueSet { id } => {
                write!(f, "Extra value set not in canonical snapshot: {}", id)
            }
            Finding::MissingValue { value_set, code } => {
                write!(f, "Missing value {} in value set {}", code, value_set)
            }
            Finding::ExtraValue { value_set, code } => write!(
                f,
                "Extra value {} in value set {} not in canonical snapshot",
                code, value_set
            ),
        }
    }
}

/// Result of validating a store.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Canonical registry version.
    pub expected_version: String,
    /// Canonical snapshot id.
    pub expected_snapshot: String,
    /// Version held by the store, if any.
    pub actual_version: Option<String>,
    /// Snapshot id held by the store, if any.
    pub actual_snapshot: Option<String>,
    /// Every finding, in check order.
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// Whether the store is valid (no error findings).
    pub fn is_valid(&self) -> bool {
        !self.findings.iter().any(Finding::is_error)
    }

    /// Error findings.
    pub fn error_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    /// Warning findings.
    pub fn warning_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }

    /// Rendered error messages.
    pub fn errors(&self) -> Vec<String> {
        self.error_findings().map(ToString::to_string).collect()
    }

    /// Rendered warning messages.
    pub fn warnings(&self) -> Vec<String> {
        self.warning_findings().map(ToString::to_string).collect()
    }
}

/// Compares external store state against the canonical snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateValidator;

impl StateValidator {
    /// Create a validator.
    pub fn new() -> Self {
        Self
    }

    /// Validate an already-read store state.
    pub fn validate(
        &self,
        canonical: &Snapshot,
        external: &ExternalStoreSnapshot,
    ) -> ValidationReport {
        let mut findings = Vec::new();

        self.check_metadata(canonical, external, &mut findings);

        diff_sets(
            &canonical.value_set_ids(),
            &external.value_set_ids,
            |id| Finding::MissingValueSet { id },
            |id| Finding::ExtraValueSet { id },
            &mut findings,
        );

        diff_sets(
            &canonical.concept_ids(),
            &external.concept_ids,
            |id| Finding::MissingConcept { id },
            |id| Finding::ExtraConcept { id },
            &mut findings,
        );

        let empty = BTreeSet::new();
        for set in canonical.list_value_sets() {
            let id = set.id();
            let stored = external.values_for(&id).unwrap_or(&empty);
            diff_sets(
                &canonical.value_codes(&id),
                stored,
                |code| Finding::MissingValue {
                    value_set: id.clone(),
                    code,
                },
                |code| Finding::ExtraValue {
                    value_set: id.clone(),
                    code,
                },
                &mut findings,
            );
        }

        let report = ValidationReport {
            expected_version: canonical.kernel_version().to_string(),
            expected_snapshot: canonical.snapshot_id().to_string(),
            actual_version: external.metadata.as_ref().map(|m| m.kernel_version.clone()),
            actual_snapshot: external.metadata.as_ref().map(|m| m.snapshot_id.clone()),
            findings,
        };

        if report.is_valid() {
            debug!(warnings = report.warning_findings().count(), "External store is valid");
        } else {
            warn!(
                errors = report.error_findings().count(),
                warnings = report.warning_findings().count(),
                "External store is out of sync"
            );
        }

        report
    }

    /// Read the store and validate it.
    pub async fn validate_store<S: RegistryStore + ?Sized>(
        &self,
        canonical: &Snapshot,
        store: &S,
    ) -> MigrateResult<ValidationReport> {
        let external = SnapshotReader::new(store).read_for(canonical).await?;
        Ok(self.validate(canonical, &external))
    }

    fn check_metadata(
        &self,
        canonical: &Snapshot,
        external: &ExternalStoreSnapshot,
        findings: &mut Vec<Finding>,
    ) {
        let Some(metadata) = &external.metadata else {
            findings.push(Finding::MetadataMissing);
            return;
        };

        let expected_version = canonical.kernel_version().to_string();
        let mut matches = true;

        if metadata.kernel_version != expected_version {
            findings.push(Finding::VersionMismatch {
                expected: expected_version,
                actual: metadata.kernel_version.clone(),
            });
            matches = false;
        }
        if metadata.snapshot_id != canonical.snapshot_id() {
            findings.push(Finding::SnapshotMismatch {
                expected: canonical.snapshot_id().to_string(),
                actual: metadata.snapshot_id.clone(),
            });
            matches = false;
        }
        if matches && !metadata.is_current {
            findings.push(Finding::StaleMetadata {
                snapshot_id: metadata.snapshot_id.clone(),
            });
        }
    }
}

/// Push `missing = canonical - external` and `extra = external - canonical`.
fn diff_sets(
    canonical: &BTreeSet<&str>,
    external: &BTreeSet<String>,
    missing: impl Fn(String) -> Finding,
    extra: impl Fn(String) -> Finding,
    findings: &mut Vec<Finding>,
) {
    for id in canonical {
        if !external.contains(*id) {
            findings.push(missing(id.to_string()));
        }
    }
    for id in external {
        if !canonical.contains(id.as_str()) {
            findings.push(extra(id.clone()));
        }
    }
}
