//! `canon migrate` command - Migrate the external store.

use std::path::Path;

use canon_migrate::{MigrationOptions, MigrationResult};

use crate::cli::MigrateArgs;
use crate::error::{CliError, CliResult};
use crate::output::{self, kv, success};
use crate::project::Project;

/// Run the migrate command
pub async fn run(args: MigrateArgs, config: Option<&Path>) -> CliResult<()> {
    output::header("Migrate");

    let project = Project::load(config)?;
    let store = if args.dry_run {
        project.store().await?
    } else {
        project.store_for_write().await?
    };
    let engine = project.engine(store).await?;

    kv("From", &args.from);
    kv("To", &args.to);
    kv("Canonical", &engine.current_version().to_string());
    kv("Store", &project.config.store.provider.to_string());
    if args.dry_run {
        kv("Mode", "dry run");
    }
    if args.skip_validation {
        kv("Validation", "skipped");
    }
    output::newline();

    let options = MigrationOptions::new()
        .dry_run(args.dry_run)
        .skip_validation(args.skip_validation);
    let result = engine.execute_migration(&args.from, &args.to, options).await;

    report(&result)
}

/// Print a migration result; a failed result becomes an error.
pub(crate) fn report(result: &MigrationResult) -> CliResult<()> {
    if result.success {
        success(&result.message);
        let items = &result.items_migrated;
        if items.total() > 0 {
            output::newline();
            output::section("Items migrated");
            kv("Concepts", &items.concepts.to_string());
            kv("Value sets", &items.value_sets.to_string());
            kv("Values", &items.values.to_string());
        }
    } else {
        output::error(&result.message);
    }

    output::diagnostics(&result.errors, &result.warnings);

    if result.success {
        Ok(())
    } else {
        Err(CliError::Migration(result.message.clone()))
    }
}
