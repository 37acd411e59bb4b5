//! Drift classification and reporting.
//!
//! The detector turns a [`ValidationReport`] into a [`DriftResult`] with a
//! single headline [`DriftType`] (precedence: version, snapshot identity,
//! schema), structured details and ordered recommendations. [`DriftReport`]
//! renders the Markdown document published as a CI artifact.

use std::fmt;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use canon_registry::Snapshot;

use crate::error::MigrateResult;
use crate::sql::METADATA_TABLE;
use crate::store::RegistryStore;
use crate::validate::{Finding, StateValidator, ValidationReport};

/// Headline drift classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftType {
    /// The store matches the canonical snapshot.
    None,
    /// The store claims a different (or no) registry version.
    Version,
    /// The store was built from a different snapshot of the same version.
    SnapshotIdentity,
    /// Concepts, value sets or values differ.
    Schema,
}

impl fmt::Display for DriftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftType::None => write!(f, "none"),
            DriftType::Version => write!(f, "version"),
            DriftType::SnapshotIdentity => write!(f, "snapshot-identity"),
            DriftType::Schema => write!(f, "schema"),
        }
    }
}

/// A value identified by its value set and code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueRef {
    /// Value set id.
    pub value_set: String,
    /// Value code.
    pub code: String,
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.value_set, self.code)
    }
}

/// Structured drift details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftDetails {
    /// The store has no metadata row.
    pub metadata_missing: bool,
    /// The stored version differs from the canonical one.
    pub version_mismatch: bool,
    /// The stored snapshot id differs from the canonical one.
    pub snapshot_mismatch: bool,
    /// Canonical concepts absent from the store.
    pub missing_concepts: Vec<String>,
    /// Stored concepts unknown to the canonical snapshot.
    pub extra_concepts: Vec<String>,
    /// Canonical value sets absent from the store.
    pub missing_value_sets: Vec<String>,
    /// Stored value sets unknown to the canonical snapshot.
    pub extra_value_sets: Vec<String>,
    /// Canonical values absent from the store.
    pub missing_values: Vec<ValueRef>,
    /// Stored values unknown to the canonical snapshot.
    pub extra_values: Vec<ValueRef>,
}

impl DriftDetails {
    fn from_findings(findings: &[Finding]) -> Self {
        let mut details = Self::default();
        for finding in findings {
            match finding {
                Finding::MetadataMissing => details.metadata_missing = true,
                Finding::VersionMismatch { .. } => details.version_mismatch = true,
                Finding::SnapshotMismatch { .. } => details.snapshot_mismatch = true,
                Finding::StaleMetadata { .. } => {}
                Finding::MissingConcept { id } => details.missing_concepts.push(id.clone()),
                Finding::ExtraConcept { id } => details.extra_concepts.push(id.clone()),
                Finding::MissingValueSet { id } => details.missing_value_sets.push(id.clone()),
                Finding::ExtraValueSet { id } => details.extra_value_sets.push(id.clone()),
                Finding::MissingValue { value_set, code } => details.missing_values.push(ValueRef {
                    value_set: value_set.clone(),
                    code: code.clone(),
                }),
                Finding::ExtraValue { value_set, code } => details.extra_values.push(ValueRef {
                    value_set: value_set.clone(),
                    code: code.clone(),
                }),
            }
        }
        details
    }

    /// Whether any concept, value set or value differs.
    pub fn has_schema_drift(&self) -> bool {
        !self.missing_concepts.is_empty()
            || !self.extra_concepts.is_empty()
            || !self.missing_value_sets.is_empty()
            || !self.extra_value_sets.is_empty()
            || !self.missing_values.is_empty()
            || !self.extra_values.is_empty()
    }

    /// Get a summary of the drift.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.metadata_missing {
            parts.push("metadata missing".to_string());
        }
        if self.version_mismatch {
            parts.push("version mismatch".to_string());
        }
        if self.snapshot_mismatch {
            parts.push("snapshot mismatch".to_string());
        }
        for (count, label) in [
            (self.missing_concepts.len(), "missing concepts"),
            (self.extra_concepts.len(), "extra concepts"),
            (self.missing_value_sets.len(), "missing value sets"),
            (self.extra_value_sets.len(), "extra value sets"),
            (self.missing_values.len(), "missing values"),
            (self.extra_values.len(), "extra values"),
        ] {
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }

        if parts.is_empty() {
            "No drift detected".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Classified drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftResult {
    /// Whether the store diverges from the canonical snapshot.
    pub has_drift: bool,
    /// Headline drift type.
    pub drift_type: DriftType,
    /// Structured details.
    pub details: DriftDetails,
    /// Ordered remediation steps.
    pub recommendations: Vec<String>,
}

/// Classifies validation findings into drift.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriftDetector {
    validator: StateValidator,
}

impl DriftDetector {
    /// Create a detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a validation report.
    pub fn classify(&self, report: &ValidationReport) -> DriftResult {
        let details = DriftDetails::from_findings(&report.findings);

        let drift_type = if details.metadata_missing || details.version_mismatch {
            DriftType::Version
        } else if details.snapshot_mismatch {
            DriftType::SnapshotIdentity
        } else if details.has_schema_drift() {
            DriftType::Schema
        } else {
            DriftType::None
        };

        let recommendations = recommendations(report, &details);

        DriftResult {
            has_drift: drift_type != DriftType::None,
            drift_type,
            details,
            recommendations,
        }
    }

    /// Read the store, validate it and build a drift report.
    pub async fn detect<S: RegistryStore + ?Sized>(
        &self,
        canonical: &Snapshot,
        store: &S,
    ) -> MigrateResult<DriftReport> {
        let validation = self.validator.validate_store(canonical, store).await?;
        let report = DriftReport::new(&validation, self.classify(&validation));

        if report.result.has_drift {
            warn!(
                drift_type = %report.result.drift_type,
                summary = %report.result.details.summary(),
                "Drift detected"
            );
        } else {
            info!(version = %canonical.kernel_version(), "No drift detected");
        }

        Ok(report)
    }
}

fn recommendations(report: &ValidationReport, details: &DriftDetails) -> Vec<String> {
    let mut out = Vec::new();

    if details.metadata_missing {
        out.push(format!(
            "Initialize {} with kernel_version {} by running a sync against the canonical snapshot",
            METADATA_TABLE, report.expected_version
        ));
    }
    if details.version_mismatch {
        out.push(format!(
            "Update kernel_version in {} from {} to {}",
            METADATA_TABLE,
            report.actual_version.as_deref().unwrap_or("unknown"),
            report.expected_version
        ));
    }
    if details.snapshot_mismatch {
        out.push(format!(
            "Update snapshot_id in {} to {} by re-applying the canonical snapshot",
            METADATA_TABLE, report.expected_snapshot
        ));
    }
    if details.has_schema_drift() {
        out.push(
            "Run migration to sync the external store with the canonical snapshot".to_string(),
        );
        if !details.missing_concepts.is_empty() || !details.missing_values.is_empty() {
            out.push(format!(
                "Restore {} missing concept(s) and {} missing value(s) from the canonical snapshot",
                details.missing_concepts.len(),
                details.missing_values.len()
            ));
        }
        let extras = details.extra_concepts.len()
            + details.extra_value_sets.len()
            + details.extra_values.len();
        if extras > 0 {
            out.push(format!(
                "Review {} extra item(s) not in the canonical snapshot; they are deactivated on sync",
                extras
            ));
        }
    }

    out
}

/// A full drift report, renderable as Markdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Canonical version.
    pub expected_version: String,
    /// Canonical snapshot id.
    pub expected_snapshot: String,
    /// Version held by the store.
    pub actual_version: Option<String>,
    /// Snapshot id held by the store.
    pub actual_snapshot: Option<String>,
    /// Classified drift.
    pub result: DriftResult,
    /// Rendered validation errors.
    pub errors: Vec<String>,
    /// Rendered validation warnings.
    pub warnings: Vec<String>,
}

impl DriftReport {
    /// Build a report from a validation and its classification.
    pub fn new(validation: &ValidationReport, result: DriftResult) -> Self {
        Self {
            generated_at: Utc::now(),
            expected_version: validation.expected_version.clone(),
            expected_snapshot: validation.expected_snapshot.clone(),
            actual_version: validation.actual_version.clone(),
            actual_snapshot: validation.actual_snapshot.clone(),
            result,
            errors: validation.errors(),
            warnings: validation.warnings(),
        }
    }

    /// Whether drift was found.
    pub fn has_drift(&self) -> bool {
        self.result.has_drift
    }

    /// Render the report as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let unknown = "(none)";

        let _ = writeln!(md, "# Registry Drift Report");
        let _ = writeln!(md);
        let _ = writeln!(md, "Generated: {}", self.generated_at.to_rfc3339());
        let _ = writeln!(md);

        let _ = writeln!(md, "## Comparison");
        let _ = writeln!(md);
        let _ = writeln!(md, "| | Canonical | External store |");
        let _ = writeln!(md, "|---|---|---|");
        let _ = writeln!(
            md,
            "| Version | {} | {} |",
            self.expected_version,
            self.actual_version.as_deref().unwrap_or(unknown)
        );
        let _ = writeln!(
            md,
            "| Snapshot | {} | {} |",
            self.expected_snapshot,
            self.actual_snapshot.as_deref().unwrap_or(unknown)
        );
        let _ = writeln!(md);

        let _ = writeln!(md, "## Status");
        let _ = writeln!(md);
        if self.result.has_drift {
            let _ = writeln!(
                md,
                "**DRIFT DETECTED** ({} drift): {}",
                self.result.drift_type,
                self.result.details.summary()
            );
        } else {
            let _ = writeln!(md, "**NO DRIFT**: external store matches the canonical snapshot");
        }
        let _ = writeln!(md);

        let _ = writeln!(md, "## Details");
        let _ = writeln!(md);
        if self.errors.is_empty() && !self.result.details.has_schema_drift() {
            let _ = writeln!(md, "No differences found.");
            let _ = writeln!(md);
        } else {
            for error in &self.errors {
                let _ = writeln!(md, "- {}", error);
            }
            let details = &self.result.details;
            list_section(&mut md, "Extra concepts", &details.extra_concepts);
            list_section(&mut md, "Extra value sets", &details.extra_value_sets);
            list_section(&mut md, "Extra values", &details.extra_values);
            let _ = writeln!(md);
        }

        let _ = writeln!(md, "## Recommendations");
        let _ = writeln!(md);
        if self.result.recommendations.is_empty() {
            let _ = writeln!(md, "None.");
        } else {
            for (i, rec) in self.result.recommendations.iter().enumerate() {
                let _ = writeln!(md, "{}. {}", i + 1, rec);
            }
        }
        let _ = writeln!(md);

        let _ = writeln!(md, "## Warnings");
        let _ = writeln!(md);
        if self.warnings.is_empty() {
            let _ = writeln!(md, "None.");
        } else {
            for warning in &self.warnings {
                let _ = writeln!(md, "- {}", warning);
            }
        }

        md
    }

    /// Write the Markdown report to a file.
    pub async fn write(&self, path: impl AsRef<Path>) -> MigrateResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, self.to_markdown()).await?;
        info!(path = %path.display(), "Wrote drift report");
        Ok(())
    }
}

fn list_section<T: fmt::Display>(md: &mut String, title: &str, items: &[T]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(md);
    let _ = writeln!(md, "### {} ({})", title, items.len());
    let _ = writeln!(md);
    for item in items {
        let _ = writeln!(md, "- {}", item);
    }
}
