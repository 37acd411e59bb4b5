//! Integration tests for the Canon CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FIXTURE_LOCKFILE: &str = include_str!("fixtures/canon.lock.json");

/// Get the canon binary
#[allow(deprecated)]
fn canon_cmd() -> Command {
    let mut cmd = Command::cargo_bin("canon").unwrap();
    cmd.env_remove("CANON_DATABASE_URL")
        .env_remove("CANON_LOG_LEVEL")
        .env_remove("CANON_LOG_FORMAT");
    cmd
}

/// Project directory with the fixture lockfile and a memory store.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("canon.lock.json"), FIXTURE_LOCKFILE).unwrap();
    fs::write(
        dir.path().join("canon.toml"),
        "[store]\nprovider = \"memory\"\n",
    )
    .unwrap();
    dir
}

fn canon_in(dir: &Path) -> Command {
    let mut cmd = canon_cmd();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn test_help_command() {
    canon_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Canon CLI"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("current"))
        .stdout(predicate::str::contains("rollback"))
        .stdout(predicate::str::contains("drift"))
        .stdout(predicate::str::contains("sync"));
}

#[test]
fn test_version_command() {
    canon_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Version"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_migrate_help() {
    canon_cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--skip-validation"));
}

#[test]
fn test_check_safe_minor_bump() {
    let dir = project();
    canon_in(dir.path())
        .args(["check", "1.0.0", "1.1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Compatibility Check"))
        .stdout(predicate::str::contains("is safe"));
}

#[test]
fn test_check_json() {
    let dir = project();
    canon_in(dir.path())
        .args(["check", "1.0.0", "1.1.0", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"breaking\": false"))
        .stdout(predicate::str::contains("\"safe\": true"));
}

#[test]
fn test_check_unsafe_exits_nonzero() {
    let dir = project();
    canon_in(dir.path())
        .args(["check", "1.0.0", "2.0.0"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("is not safe"))
        .stderr(predicate::str::contains("1.0.0 -> 2.0.0 is not safe"));
}

#[test]
fn test_check_unsafe_json_still_prints_record() {
    let dir = project();
    canon_in(dir.path())
        .args(["check", "1.0.0", "2.0.0", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"breaking\": true"))
        .stdout(predicate::str::contains("\"safe\": false"))
        .stdout(predicate::str::contains("migrate_1_0_to_2_0"));
}

#[test]
fn test_check_works_without_lockfile() {
    let dir = TempDir::new().unwrap();
    canon_in(dir.path())
        .args(["check", "2.3.4", "2.3.4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no version change"));
}

#[test]
fn test_check_invalid_version() {
    let dir = project();
    canon_in(dir.path())
        .args(["check", "1.0", "1.1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid version format"));
}

#[test]
fn test_check_uses_overrides_file() {
    let dir = project();
    fs::write(
        dir.path().join("compatibility.toml"),
        r#"
[[transition]]
from = "2.0.0"
to = "3.0.0"
breaking = false
safe = true
migration_required = false
deprecations = ["LEGACY_VENDOR_TYPE"]
"#,
    )
    .unwrap();

    canon_in(dir.path())
        .args(["check", "2.0.0", "3.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is safe"))
        .stdout(predicate::str::contains("LEGACY_VENDOR_TYPE"));
}

#[test]
fn test_check_safe_transition_needing_migration() {
    let dir = project();
    fs::write(
        dir.path().join("compatibility.toml"),
        r#"
[[transition]]
from = "2.0.0"
to = "2.1.0"
breaking = false
safe = true
migration_required = true
"#,
    )
    .unwrap();

    canon_in(dir.path())
        .args(["check", "2.0.0", "2.1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is safe"))
        .stdout(predicate::str::contains("canon migrate 2.0.0 2.1.0"));
}

#[test]
fn test_invalid_overrides_file() {
    let dir = project();
    fs::write(dir.path().join("compatibility.toml"), "[[transition]]\nfrom = 1\n").unwrap();

    canon_in(dir.path())
        .args(["check", "1.0.0", "1.1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_current_prints_canonical_version() {
    let dir = project();
    canon_in(dir.path())
        .arg("current")
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0.0"))
        .stdout(predicate::str::contains("snap_fixture_2_0_0"));
}

#[test]
fn test_missing_lockfile() {
    let dir = TempDir::new().unwrap();
    canon_in(dir.path())
        .arg("current")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Snapshot error"));
}

#[test]
fn test_duplicate_concept_in_lockfile() {
    let dir = project();
    let lockfile = FIXTURE_LOCKFILE.replace("\"id\": \"VENDOR\"", "\"id\": \"INVOICE\"");
    fs::write(dir.path().join("canon.lock.json"), lockfile).unwrap();

    canon_in(dir.path())
        .arg("current")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate concept identifier 'INVOICE'"));
}

#[test]
fn test_explicit_config_path() {
    let dir = project();
    let nested = dir.path().join("registry");
    fs::create_dir_all(&nested).unwrap();
    fs::rename(
        dir.path().join("canon.lock.json"),
        nested.join("canon.lock.json"),
    )
    .unwrap();
    fs::write(
        nested.join("canon.toml"),
        "[store]\nprovider = \"memory\"\n",
    )
    .unwrap();

    canon_in(dir.path())
        .args(["--config", "registry/canon.toml", "current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0.0"));
}

#[test]
fn test_validate_safe_migration() {
    let dir = project();
    canon_in(dir.path())
        .args(["validate", "1.0.0", "1.0.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_validate_breaking_migration() {
    let dir = project();
    canon_in(dir.path())
        .args(["validate", "1.0.0", "2.0.0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not safe"))
        .stdout(predicate::str::contains("Schema change in version 2.0.0"));
}

#[test]
fn test_validate_json() {
    let dir = project();
    canon_in(dir.path())
        .args(["validate", "1.0.0", "1.1.0", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"));
}

#[test]
fn test_migrate_no_migration_required() {
    let dir = project();
    canon_in(dir.path())
        .args(["migrate", "1.0.0", "1.1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No migration required"));
}

#[test]
fn test_migrate_unsafe_fails() {
    let dir = project();
    canon_in(dir.path())
        .args(["migrate", "1.0.0", "2.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not safe"));
}

#[test]
fn test_migrate_dry_run() {
    let dir = project();
    canon_in(dir.path())
        .args(["migrate", "1.0.0", "2.0.0", "--dry-run", "--skip-validation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("Warnings (1)"));
}

#[test]
fn test_migrate_forced_writes_items() {
    let dir = project();
    canon_in(dir.path())
        .args(["migrate", "1.0.0", "2.0.0", "--skip-validation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Migrated from 1.0.0 to 2.0.0"))
        .stdout(predicate::str::contains("Items migrated"));
}

#[test]
fn test_rollback_requires_matching_snapshot() {
    // The fixture is 2.0.0, so restoring 1.0.0 cannot be applied.
    let dir = project();
    canon_in(dir.path())
        .args(["rollback", "1.0.0", "2.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not match canonical snapshot version"));
}

#[test]
fn test_rollback_dry_run() {
    let dir = project();
    canon_in(dir.path())
        .args(["rollback", "1.0.0", "2.0.0", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn test_drift_on_empty_store() {
    let dir = project();
    canon_in(dir.path())
        .args(["drift", "--output", "reports/drift.md"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("version"))
        .stderr(predicate::str::contains("Drift detected"));

    let report = fs::read_to_string(dir.path().join("reports").join("drift.md")).unwrap();
    assert!(report.starts_with("# Registry Drift Report"));
    assert!(report.contains("**DRIFT DETECTED** (version drift)"));
    assert!(report.contains("Run migration to sync"));
}

#[test]
fn test_drift_json() {
    let dir = project();
    canon_in(dir.path())
        .args(["drift", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"driftType\": \"version\""))
        .stdout(predicate::str::contains("\"hasDrift\": true"));
}

#[test]
fn test_sync_dry_run_prints_sql() {
    let dir = project();
    canon_in(dir.path())
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATE TABLE IF NOT EXISTS"))
        .stdout(predicate::str::contains("ON CONFLICT"));
}

#[test]
fn test_sync_output_file() {
    let dir = project();
    canon_in(dir.path())
        .args(["sync", "--output", "out/sync.sql"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let script = fs::read_to_string(dir.path().join("out").join("sync.sql")).unwrap();
    assert!(script.starts_with("BEGIN;"));
    assert!(script.trim_end().ends_with("COMMIT;"));
    assert!(script.contains("'TAX_CODES@US'"));
    assert!(script.contains("'snap_fixture_2_0_0'"));
}

#[test]
fn test_sync_memory_store() {
    let dir = project();
    canon_in(dir.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Store synced"));
}

#[test]
fn test_postgres_without_url() {
    let dir = project();
    fs::write(dir.path().join("canon.toml"), "[store]\nprovider = \"postgresql\"\n").unwrap();

    canon_in(dir.path())
        .arg("drift")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}
