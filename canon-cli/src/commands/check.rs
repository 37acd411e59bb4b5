//! `canon check` command - Compare two registry versions.
//!
//! Exits non-zero when the transition is not safe.

use std::path::Path;

use canon_migrate::CompatibilityRecord;

use crate::cli::CheckArgs;
use crate::error::{CliError, CliResult};
use crate::output::{self, kv, yes_no};
use crate::project::Project;

/// Run the check command
pub async fn run(args: CheckArgs, config: Option<&Path>) -> CliResult<()> {
    let project = Project::load(config)?;
    let matrix = project.matrix().await?;
    let record = matrix.check_str(&args.from, &args.to)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return verdict(&record);
    }

    output::header("Compatibility Check");

    kv("From", &record.from.to_string());
    kv("To", &record.to.to_string());
    kv("Change", &record.change().to_string());
    kv("Breaking", yes_no(record.breaking));
    kv("Safe", yes_no(record.safe));
    kv("Migration required", yes_no(record.migration_required));
    if let Some(script) = &record.migration_script {
        kv("Migration script", script);
    }

    if !record.deprecations.is_empty() {
        output::newline();
        output::section("Deprecations");
        for id in &record.deprecations {
            output::list_item(id);
        }
    }

    output::newline();
    if record.safe {
        output::success(&format!("{} -> {} is safe", record.from, record.to));
        if record.migration_required {
            output::info(&format!(
                "Run `canon migrate {} {}` to update the external store",
                record.from, record.to
            ));
        }
    } else {
        output::warn(&format!(
            "{} -> {} is not safe; migrate with --skip-validation after review",
            record.from, record.to
        ));
    }

    verdict(&record)
}

fn verdict(record: &CompatibilityRecord) -> CliResult<()> {
    if record.safe {
        Ok(())
    } else {
        Err(CliError::Validation(format!(
            "{} -> {} is not safe",
            record.from, record.to
        )))
    }
}
