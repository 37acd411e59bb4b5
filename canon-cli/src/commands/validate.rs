//! `canon validate` command - Preflight a migration.

use std::path::Path;

use crate::cli::ValidateArgs;
use crate::error::{CliError, CliResult};
use crate::output::{self, kv, success};
use crate::project::Project;

/// Run the validate command
pub async fn run(args: ValidateArgs, config: Option<&Path>) -> CliResult<()> {
    let project = Project::load(config)?;
    // Preflight never touches the store.
    let engine = project.offline_engine().await?;
    let validation = engine.validate_migration(&args.from, &args.to);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else {
        output::header("Validate Migration");
        kv("From", &args.from);
        kv("To", &args.to);
        output::newline();

        if validation.valid {
            success(&format!("Migration from {} to {} is valid", args.from, args.to));
        } else {
            output::error(&format!(
                "Migration from {} to {} is invalid",
                args.from, args.to
            ));
            output::diagnostics(&validation.errors, &[]);
        }
    }

    if validation.valid {
        Ok(())
    } else {
        Err(CliError::Validation(format!(
            "{} problem(s) found",
            validation.errors.len()
        )))
    }
}
