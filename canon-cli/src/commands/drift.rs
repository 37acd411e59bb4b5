//! `canon drift` command - Detect drift in the external store.

use std::path::Path;

use canon_migrate::{DriftDetector, DriftReport};

use crate::cli::DriftArgs;
use crate::error::{CliError, CliResult};
use crate::output::{self, kv, success};
use crate::project::Project;

/// Run the drift command
pub async fn run(args: DriftArgs, config: Option<&Path>) -> CliResult<()> {
    let project = Project::load(config)?;
    let snapshot = project.snapshot().await?;
    let store = project.store().await?;

    let report = DriftDetector::new().detect(&snapshot, &*store).await?;

    let output_path = args
        .output
        .as_deref()
        .or(project.config.drift.report.as_deref())
        .map(|p| project.resolve(p));
    if let Some(path) = &output_path {
        report.write(path).await?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
        if let Some(path) = &output_path {
            output::newline();
            output::dim(&format!("Report written to {}", path.display()));
        }
    }

    if report.has_drift() {
        Err(CliError::Drift(format!(
            "{} drift ({})",
            report.result.drift_type,
            report.result.details.summary()
        )))
    } else {
        Ok(())
    }
}

fn print_report(report: &DriftReport) {
    output::header("Drift Detection");

    kv("Canonical version", &report.expected_version);
    kv("Canonical snapshot", &report.expected_snapshot);
    kv(
        "Store version",
        report.actual_version.as_deref().unwrap_or("(none)"),
    );
    kv(
        "Store snapshot",
        report.actual_snapshot.as_deref().unwrap_or("(none)"),
    );
    output::newline();

    if report.has_drift() {
        output::warn(&format!(
            "Drift detected: {} ({})",
            report.result.drift_type,
            report.result.details.summary()
        ));
    } else {
        success("No drift detected");
    }

    output::diagnostics(&report.errors, &report.warnings);

    if !report.result.recommendations.is_empty() {
        output::newline();
        output::section("Recommendations");
        for (i, rec) in report.result.recommendations.iter().enumerate() {
            output::numbered_item(i + 1, rec);
        }
    }
}
