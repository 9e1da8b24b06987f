//! Integration tests for the trellis CLI.
//!
//! These run the built binary and check output and exit codes.

use rstest::{fixture, rstest};
use serde_json::Value;
use tempfile::TempDir;

mod common;
use common::{child, issue, jsonl, run_trellis_in_dir};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Provides a fresh temporary directory for each test
#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Provides a temporary directory with trellis initialized
#[fixture]
fn initialized_dir() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let output = run_trellis_in_dir(
        temp.path(),
        &[
            "init",
            "--tenant",
            common::TENANT,
            "--product",
            common::PRODUCT,
            "--user",
            common::USER,
            "--quiet",
        ],
    );
    assert!(
        output.status.success(),
        "Failed to initialize trellis: {:?}",
        String::from_utf8_lossy(&output.stderr)
    );
    temp
}

fn write_input(dir: &TempDir, content: &str) {
    std::fs::write(dir.path().join("issues.jsonl"), content).unwrap();
}

fn sample_input() -> String {
    jsonl(&[
        issue("bd-1", "epic"),
        child("bd-2", "feature", "bd-1"),
        child("bd-3", "task", "bd-2"),
        issue("bd-4", "bug"),
    ])
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[rstest]
fn help_lists_commands(temp_dir: TempDir) {
    let output = run_trellis_in_dir(temp_dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("init"));
    assert!(stdout.contains("import"));
}

#[rstest]
fn version(temp_dir: TempDir) {
    let output = run_trellis_in_dir(temp_dir.path(), &["--version"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("0.1.0"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[rstest]
fn init_creates_config_and_store(initialized_dir: TempDir) {
    let trellis_dir = initialized_dir.path().join(".trellis");
    assert!(trellis_dir.join("config.yaml").exists());
    assert!(trellis_dir.join("store.jsonl").exists());
    assert!(trellis_dir.join(".gitignore").exists());
}

#[rstest]
fn init_twice_fails(initialized_dir: TempDir) {
    let output = run_trellis_in_dir(
        initialized_dir.path(),
        &["init", "--tenant", "acme", "--product", "P", "--user", "U"],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already initialized"));
}

#[rstest]
fn init_json_output(temp_dir: TempDir) {
    let output = run_trellis_in_dir(
        temp_dir.path(),
        &[
            "--json", "init", "--tenant", "acme", "--product", "P", "--user", "U",
        ],
    );

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["tenant"], "acme");
    assert!(json["store_file"].as_str().unwrap().ends_with("store.jsonl"));
}

// ============================================================================
// Import Tests
// ============================================================================

#[rstest]
fn import_prints_summary(initialized_dir: TempDir) {
    write_input(&initialized_dir, &sample_input());

    let output = run_trellis_in_dir(initialized_dir.path(), &["import", "issues.jsonl"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Import complete (tenant acme)"));
    assert!(stdout.contains("epics:    created 1"));
    assert!(stdout.contains("1 unsupported issue(s) ignored"));
    assert!(stdout.contains("Store counts match"));
}

#[rstest]
fn import_json_is_idempotent(initialized_dir: TempDir) {
    write_input(&initialized_dir, &sample_input());

    let first = run_trellis_in_dir(initialized_dir.path(), &["--json", "import", "issues.jsonl"]);
    let second = run_trellis_in_dir(initialized_dir.path(), &["--json", "import", "issues.jsonl"]);

    assert!(first.status.success());
    assert!(second.status.success());
    let first: Value = serde_json::from_slice(&first.stdout).unwrap();
    let second: Value = serde_json::from_slice(&second.stdout).unwrap();
    for i in 0..3 {
        assert_eq!(first["kinds"][i]["created"], 1);
        assert_eq!(second["kinds"][i]["created"], 0);
        assert_eq!(second["kinds"][i]["reused"], 1);
    }
    assert_eq!(second["cancelled"], false);
    assert_eq!(second["unsupported"][0], "bd-4");
}

#[rstest]
fn malformed_line_still_exits_zero(initialized_dir: TempDir) {
    let content = format!(
        "{}not json at all\n{}",
        jsonl(&[issue("bd-1", "epic")]),
        jsonl(&[issue("bd-2", "epic")])
    );
    write_input(&initialized_dir, &content);

    let output = run_trellis_in_dir(initialized_dir.path(), &["--json", "import", "issues.jsonl"]);

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["kinds"][0]["created"], 2);
    assert_eq!(json["malformed_lines"][0]["line_number"], 2);
}

#[rstest]
fn skipped_records_still_exit_zero(initialized_dir: TempDir) {
    write_input(&initialized_dir, &jsonl(&[issue("bd-1", "feature")]));

    let output = run_trellis_in_dir(initialized_dir.path(), &["--json", "import", "issues.jsonl"]);

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["skipped"][0]["reason"], "unresolved_parent");
}

#[rstest]
fn missing_seed_exits_non_zero_and_writes_nothing(initialized_dir: TempDir) {
    write_input(&initialized_dir, &sample_input());
    let store = initialized_dir.path().join(".trellis").join("store.jsonl");
    let before = std::fs::read_to_string(&store).unwrap();

    let output = run_trellis_in_dir(
        initialized_dir.path(),
        &["import", "issues.jsonl", "--product", "NOPE"],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Product 'NOPE' not found"));
    assert_eq!(std::fs::read_to_string(&store).unwrap(), before);
}

#[rstest]
fn missing_input_exits_non_zero(initialized_dir: TempDir) {
    let output = run_trellis_in_dir(initialized_dir.path(), &["import", "absent.jsonl"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.jsonl"));
}

#[rstest]
fn import_without_config_reports_missing_tenant(temp_dir: TempDir) {
    write_input(&temp_dir, &sample_input());

    let output = run_trellis_in_dir(temp_dir.path(), &["import", "issues.jsonl"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("TRELLIS_TENANT"));
}

#[rstest]
fn environment_supplies_settings(initialized_dir: TempDir) {
    write_input(&initialized_dir, &sample_input());

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_trellis"))
        .args(["import", "issues.jsonl"])
        .current_dir(initialized_dir.path())
        .env("TRELLIS_TENANT", "globex")
        .output()
        .unwrap();

    // The seed was created for acme, so globex has no product.
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("tenant 'globex'"));
}
