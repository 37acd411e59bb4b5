//! `canon rollback` command - Undo a migration.

use std::path::Path;

use crate::cli::RollbackArgs;
use crate::commands::migrate;
use crate::error::CliResult;
use crate::output::{self, kv};
use crate::project::Project;

/// Run the rollback command
pub async fn run(args: RollbackArgs, config: Option<&Path>) -> CliResult<()> {
    output::header("Rollback");

    let project = Project::load(config)?;
    let store = if args.dry_run {
        project.store().await?
    } else {
        project.store_for_write().await?
    };
    let engine = project.engine(store).await?;

    kv("Undo", &format!("{} -> {}", args.from, args.to));
    kv("Restore", &args.from);
    kv("Canonical", &engine.current_version().to_string());
    if args.dry_run {
        kv("Mode", "dry run");
    }
    output::newline();
    output::warn("Rollbacks bypass compatibility validation");
    output::newline();

    let result = engine
        .rollback_migration(&args.from, &args.to, args.dry_run)
        .await;

    migrate::report(&result)
}
