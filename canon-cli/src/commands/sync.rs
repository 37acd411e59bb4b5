//! `canon sync` command - Reconcile the external store with the canonical snapshot.

use std::path::Path;

use canon_migrate::{SyncSqlGenerator, Synchronizer};

use crate::cli::SyncArgs;
use crate::error::CliResult;
use crate::output::{self, kv, success};
use crate::project::Project;

/// Run the sync command
pub async fn run(args: SyncArgs, config: Option<&Path>) -> CliResult<()> {
    let project = Project::load(config)?;
    let snapshot = project.snapshot().await?;

    if args.dry_run || args.output.is_some() {
        let sql = SyncSqlGenerator::new()
            .with_schema(project.config.store.schema.clone())
            .generate(&snapshot);
        let script = sql.to_script();

        match &args.output {
            Some(path) => {
                let path = project.resolve(path);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, &script).await?;
                success(&format!(
                    "Wrote {} statements to {}",
                    sql.statements.len(),
                    path.display()
                ));
            }
            None => {
                output::header("Sync (dry run)");
                output::code(&script);
            }
        }
        return Ok(());
    }

    output::header("Sync");
    kv("Version", &snapshot.kernel_version().to_string());
    kv("Snapshot", snapshot.snapshot_id());
    kv("Store", &project.config.store.provider.to_string());
    output::newline();

    let store = project.store_for_write().await?;
    let report = Synchronizer::new(&*store).apply(&snapshot).await?;

    success("Store synced with the canonical snapshot");
    output::newline();
    output::section("Changes");
    kv(
        "Concepts",
        &format!(
            "{} changed, {} deactivated",
            report.changed.concepts, report.deactivated.concepts
        ),
    );
    kv(
        "Value sets",
        &format!(
            "{} changed, {} deactivated",
            report.changed.value_sets, report.deactivated.value_sets
        ),
    );
    kv(
        "Values",
        &format!(
            "{} changed, {} deactivated",
            report.changed.values, report.deactivated.values
        ),
    );

    Ok(())
}
