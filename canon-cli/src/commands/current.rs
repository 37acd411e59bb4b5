//! `canon current` command - Print the canonical registry version.

use std::path::Path;

use crate::error::CliResult;
use crate::output::{self, kv};
use crate::project::Project;

/// Run the current command
pub async fn run(config: Option<&Path>) -> CliResult<()> {
    let project = Project::load(config)?;
    let snapshot = project.snapshot().await?;

    output::header("Canonical Registry");

    kv("Version", &snapshot.kernel_version().to_string());
    kv("Snapshot", snapshot.snapshot_id());
    kv("Generated", &snapshot.generated_at().to_rfc3339());
    kv("Lockfile", &project.snapshot_path().display().to_string());
    output::newline();

    output::section("Contents");
    kv("Concepts", &snapshot.concept_count().to_string());
    kv("Value sets", &snapshot.value_set_count().to_string());
    kv("Values", &snapshot.value_count().to_string());

    Ok(())
}
