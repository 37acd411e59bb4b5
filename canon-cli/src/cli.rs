//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Canon CLI - canonical registry versioning and drift reconciliation
#[derive(Parser, Debug)]
#[command(name = "canon")]
#[command(version)]
#[command(about = "Canon CLI - registry versioning and drift reconciliation", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./canon.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check compatibility between two registry versions
    Check(CheckArgs),

    /// Migrate the external store between two registry versions
    Migrate(MigrateArgs),

    /// Preflight a migration without executing it
    Validate(ValidateArgs),

    /// Print the canonical registry version
    Current,

    /// Undo a migration, bypassing validation
    Rollback(RollbackArgs),

    /// Detect drift between the external store and the canonical snapshot
    Drift(DriftArgs),

    /// Sync the canonical snapshot into the external store
    Sync(SyncArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Check Command
// =============================================================================

/// Arguments for the `check` command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Source version (major.minor.patch)
    pub from: String,

    /// Target version (major.minor.patch)
    pub to: String,

    /// Print the compatibility record as JSON
    #[arg(long)]
    pub json: bool,
}

// =============================================================================
// Migrate Command
// =============================================================================

/// Arguments for the `migrate` command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Source version (major.minor.patch)
    pub from: String,

    /// Target version (major.minor.patch)
    pub to: String,

    /// Preview the migration without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Bypass the safety gate and breaking-change checks
    #[arg(long)]
    pub skip_validation: bool,
}

// =============================================================================
// Validate Command
// =============================================================================

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Source version (major.minor.patch)
    pub from: String,

    /// Target version (major.minor.patch)
    pub to: String,

    /// Print the validation result as JSON
    #[arg(long)]
    pub json: bool,
}

// =============================================================================
// Rollback Command
// =============================================================================

/// Arguments for the `rollback` command
#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Version the migration started from (the rollback target)
    pub from: String,

    /// Version the migration went to (the current store version)
    pub to: String,

    /// Preview the rollback without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

// =============================================================================
// Drift Command
// =============================================================================

/// Arguments for the `drift` command
#[derive(Args, Debug)]
pub struct DriftArgs {
    /// Write the Markdown report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the drift result as JSON
    #[arg(long)]
    pub json: bool,
}

// =============================================================================
// Sync Command
// =============================================================================

/// Arguments for the `sync` command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Print the reconciliation SQL instead of applying it
    #[arg(long)]
    pub dry_run: bool,

    /// Write the reconciliation SQL to this file (implies --dry-run)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
