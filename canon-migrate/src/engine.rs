//! Migration planner and executor.
//!
//! [`MigrationEngine::execute_migration`] is a small state machine that ends
//! in either a successful or a failed [`MigrationResult`]:
//!
//! 1. query the compatibility matrix
//! 2. an unsafe transition fails unless validation is skipped
//! 3. a transition that needs no migration succeeds with nothing written
//! 4. breaking-change findings fail unless validation is skipped
//! 5. a dry run succeeds with nothing written, findings become warnings
//! 6. otherwise the canonical snapshot is synced into the store
//!
//! Nothing is written before step 6, so every failure before it leaves the
//! store untouched.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use canon_registry::{Snapshot, Version};

use crate::compat::{CompatibilityMatrix, CompatibilityRecord};
use crate::error::{MigrateResult, MigrationError};
use crate::store::RegistryStore;
use crate::sync::{ItemCounts, Synchronizer};

/// Options for a migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Preview only; nothing is written.
    pub dry_run: bool,
    /// Bypass the safety gate and breaking-change checks.
    pub skip_validation: bool,
}

impl MigrationOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Skip compatibility and breaking-change validation.
    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    /// Whether the run ended in success.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Every error encountered.
    pub errors: Vec<String>,
    /// Every warning encountered.
    pub warnings: Vec<String>,
    /// Items written to the store.
    pub items_migrated: ItemCounts,
}

impl MigrationResult {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            errors: Vec::new(),
            warnings: Vec::new(),
            items_migrated: ItemCounts::default(),
        }
    }

    fn failure(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors,
            warnings: Vec::new(),
            items_migrated: ItemCounts::default(),
        }
    }

    fn from_error(err: MigrationError) -> Self {
        let rendered = err.to_string();
        match err {
            MigrationError::UnsafeMigration { from, to, .. } => Self::failure(
                format!("Migration from {} to {} is not safe", from, to),
                vec![rendered],
            ),
            MigrationError::BreakingChangesDetected { from, to, findings } => Self::failure(
                format!("Breaking changes detected between {} and {}", from, to),
                findings,
            ),
            _ => Self::failure(rendered.clone(), vec![rendered]),
        }
    }

    fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Result of a side-effect-free migration preflight.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationValidation {
    /// Whether the migration would pass every check.
    pub valid: bool,
    /// Every reason it would not.
    pub errors: Vec<String>,
}

/// Plans and executes migrations of an external store.
pub struct MigrationEngine<S: RegistryStore + ?Sized> {
    matrix: CompatibilityMatrix,
    snapshot: Arc<Snapshot>,
    store: Arc<S>,
}

impl<S: RegistryStore + ?Sized> MigrationEngine<S> {
    /// Create an engine using the built-in compatibility table.
    pub fn new(snapshot: Arc<Snapshot>, store: Arc<S>) -> Self {
        Self {
            matrix: CompatibilityMatrix::builtin(),
            snapshot,
            store,
        }
    }

    /// Use a specific compatibility matrix.
    pub fn with_matrix(mut self, matrix: CompatibilityMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// The compatibility matrix.
    pub fn matrix(&self) -> &CompatibilityMatrix {
        &self.matrix
    }

    /// The canonical snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The external store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Canonical registry version.
    pub fn current_version(&self) -> Version {
        self.snapshot.kernel_version()
    }

    /// Check compatibility of two version strings.
    pub fn check_compatibility(&self, from: &str, to: &str) -> MigrateResult<CompatibilityRecord> {
        self.matrix.check_str(from, to)
    }

    /// Structural breaking-change findings for a transition.
    ///
    /// Yields at most one finding: a schema change tagged with the target
    /// version when the transition is marked breaking.
    pub fn detect_breaking_changes(&self, record: &CompatibilityRecord) -> Vec<String> {
        if record.breaking {
            let mut finding = format!(
                "Schema change in version {} ({})",
                record.to,
                record.change()
            );
            if let Some(script) = &record.migration_script {
                finding.push_str(&format!("; requires migration script {}", script));
            }
            vec![finding]
        } else {
            Vec::new()
        }
    }

    /// Run a migration from `from` to `to`.
    pub async fn execute_migration(
        &self,
        from: &str,
        to: &str,
        options: MigrationOptions,
    ) -> MigrationResult {
        match self.run(from, to, options).await {
            Ok(result) => result,
            Err(err) => {
                warn!(%from, %to, error = %err, "Migration failed");
                MigrationResult::from_error(err)
            }
        }
    }

    /// Undo a migration from `from` to `to` by migrating `to` back to `from`.
    ///
    /// Rollbacks always bypass validation.
    pub async fn rollback_migration(&self, from: &str, to: &str, dry_run: bool) -> MigrationResult {
        info!(%from, %to, dry_run, "Rolling back migration");
        let options = MigrationOptions::new()
            .dry_run(dry_run)
            .skip_validation(true);
        self.execute_migration(to, from, options).await
    }

    /// Run the compatibility and breaking-change checks without executing.
    pub fn validate_migration(&self, from: &str, to: &str) -> MigrationValidation {
        let record = match self.check_compatibility(from, to) {
            Ok(record) => record,
            Err(err) => {
                return MigrationValidation {
                    valid: false,
                    errors: vec![err.to_string()],
                };
            }
        };

        let mut errors = Vec::new();
        if !record.safe {
            errors.push(unsafe_error(&record).to_string());
        }
        errors.extend(self.detect_breaking_changes(&record));

        debug!(%from, %to, errors = errors.len(), "Validated migration");
        MigrationValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    async fn run(
        &self,
        from: &str,
        to: &str,
        options: MigrationOptions,
    ) -> MigrateResult<MigrationResult> {
        let record = self.check_compatibility(from, to)?;
        debug!(
            %from,
            %to,
            safe = record.safe,
            breaking = record.breaking,
            migration_required = record.migration_required,
            "Checked compatibility"
        );

        if !record.safe && !options.skip_validation {
            return Err(unsafe_error(&record));
        }

        if !record.migration_required {
            info!(%from, %to, "No migration required");
            return Ok(MigrationResult::success(format!(
                "No migration required from {} to {}",
                record.from, record.to
            ))
            .with_warnings(record.deprecations.iter().map(|id| deprecation(id)).collect()));
        }

        let findings = self.detect_breaking_changes(&record);
        if !findings.is_empty() && !options.skip_validation {
            return Err(MigrationError::BreakingChangesDetected {
                from: record.from.to_string(),
                to: record.to.to_string(),
                findings,
            });
        }

        let mut warnings = findings;
        warnings.extend(record.deprecations.iter().map(|id| deprecation(id)));

        if options.dry_run {
            info!(%from, %to, warnings = warnings.len(), "Dry run complete");
            return Ok(MigrationResult::success(format!(
                "Dry run: migration from {} to {} would be applied",
                record.from, record.to
            ))
            .with_warnings(warnings));
        }

        let canonical = self.snapshot.kernel_version();
        if record.to != canonical {
            return Err(MigrationError::TargetMismatch {
                target: record.to.to_string(),
                canonical: canonical.to_string(),
            });
        }

        let report = Synchronizer::new(&*self.store).apply(&self.snapshot).await?;
        info!(
            %from,
            %to,
            items = report.items.total(),
            changed = report.changed.total(),
            "Migration applied"
        );

        let mut result = MigrationResult::success(format!(
            "Migrated from {} to {}",
            record.from, record.to
        ))
        .with_warnings(warnings);
        result.items_migrated = report.items;
        Ok(result)
    }
}

fn unsafe_error(record: &CompatibilityRecord) -> MigrationError {
    let mut reason = record.change().to_string();
    if record.breaking {
        reason.push_str(" with breaking changes");
    }
    MigrationError::UnsafeMigration {
        from: record.from.to_string(),
        to: record.to.to_string(),
        reason,
    }
}

fn deprecation(id: &str) -> String {
    format!("Deprecated: {}", id)
}
