//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Build command for the circuitguard-cli binary.
fn circuitguard_cli() -> Command {
    cargo_bin_cmd!("circuitguard-cli")
}

/// Path to circuitguard library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("circuitguard")
        .join("tests")
        .join("fixtures")
}

fn temp_json(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_cli_help() {
    let mut cmd = circuitguard_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("measurement validation"));
}

#[test]
fn test_cli_version() {
    let mut cmd = circuitguard_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_valid_protocol() {
    let mut cmd = circuitguard_cli();
    let path = fixtures_dir().join("valid_circuits.json");

    cmd.arg("check").arg(path).arg("--fail-on").arg("info");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SK-1: no findings"))
        .stdout(predicate::str::contains("Valid:       3"));
}

#[test]
fn test_cli_check_mixed_protocol_human() {
    let mut cmd = circuitguard_cli();
    let path = fixtures_dir().join("mixed_circuits.json");

    cmd.arg("check").arg(path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[CRITICAL]"))
        .stdout(predicate::str::contains("SK-2 (NOT OK)"))
        .stdout(predicate::str::contains("Critical:    1"));
}

#[test]
fn test_cli_fail_on_thresholds() {
    let path = fixtures_dir().join("mixed_circuits.json");

    let mut cmd = circuitguard_cli();
    cmd.arg("check").arg(&path).arg("--fail-on").arg("critical");
    cmd.assert().code(1);

    // Only an INFO finding: fails on info, passes on warning.
    let info_only = temp_json(r#"[{ "id": "SK-4", "protectionCurrent": 14 }]"#);

    let mut cmd = circuitguard_cli();
    cmd.arg("check").arg(info_only.path()).arg("--fail-on").arg("warning");
    cmd.assert().code(0);

    let mut cmd = circuitguard_cli();
    cmd.arg("check").arg(info_only.path()).arg("--fail-on").arg("info");
    cmd.assert().code(1);
}

#[test]
fn test_cli_check_json_output() {
    let mut cmd = circuitguard_cli();
    let path = fixtures_dir().join("mixed_circuits.json");

    let output = cmd
        .arg("check")
        .arg(path)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["totalCircuits"], 5);
    assert_eq!(report["circuitsWithIssues"], 3);
    assert_eq!(report["circuitResults"][1]["circuitId"], "SK-2");
}

#[test]
fn test_cli_github_format() {
    let mut cmd = circuitguard_cli();
    let path = fixtures_dir().join("mixed_circuits.json");

    cmd.arg("check").arg(path).arg("--format").arg("github");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("::error file="))
        .stdout(predicate::str::contains("::notice file="));
}

#[test]
fn test_cli_check_with_tables_override() {
    let circuits = temp_json(
        r#"[{ "id": "SK-1", "current": 16, "cableGauge": "1.5", "protectionCurrent": 16 }]"#,
    );

    let mut cmd = circuitguard_cli();
    cmd.arg("check")
        .arg(circuits.path())
        .arg("--fail-on")
        .arg("critical");
    cmd.assert().code(1);

    let mut cmd = circuitguard_cli();
    cmd.arg("check")
        .arg(circuits.path())
        .arg("--tables")
        .arg(fixtures_dir().join("custom_tables.json"))
        .arg("--fail-on")
        .arg("critical");
    cmd.assert().code(0);
}

#[test]
fn test_cli_check_with_config_disabling_rule() {
    let circuits = temp_json(r#"[{ "id": "SK-5", "current": "abc" }]"#);
    let config = temp_json(r#"{ "disabled_rules": ["MEASUREMENT_FORMAT"] }"#);

    let mut cmd = circuitguard_cli();
    cmd.arg("check")
        .arg(circuits.path())
        .arg("--config")
        .arg(config.path())
        .arg("--fail-on")
        .arg("info");

    cmd.assert().code(0);
}

#[test]
fn test_cli_check_nonexistent_file() {
    let mut cmd = circuitguard_cli();

    cmd.arg("check").arg("does_not_exist.json");

    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_check_malformed_json() {
    let broken = temp_json("{ not json");

    let mut cmd = circuitguard_cli();
    cmd.arg("check").arg(broken.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("failed to read circuits"));
}

#[test]
fn test_cli_field_valid_and_invalid() {
    let mut cmd = circuitguard_cli();
    cmd.arg("field").arg("nominalFrequency").arg("50");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("valid"));

    let mut cmd = circuitguard_cli();
    cmd.arg("field").arg("nominalFrequency").arg("55");
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("50, 60"));

    let mut cmd = circuitguard_cli();
    cmd.arg("field").arg("current").arg("-5");
    cmd.assert().code(1);
}

#[test]
fn test_cli_field_json_output() {
    let mut cmd = circuitguard_cli();
    cmd.arg("field")
        .arg("cableGauge")
        .arg("NYM-J 3x2,5")
        .arg("--format")
        .arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"));
}

#[test]
fn test_cli_rules_command() {
    let mut cmd = circuitguard_cli();

    cmd.arg("rules");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("CABLE_AMPACITY"))
        .stdout(predicate::str::contains("MEASUREMENT_FORMAT"))
        .stdout(predicate::str::contains("Fields:").not());
}

#[test]
fn test_cli_rules_verbose() {
    let mut cmd = circuitguard_cli();

    cmd.arg("rules").arg("--verbose");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Fields: current, cableGauge"));
}

#[test]
fn test_cli_tables_command() {
    let mut cmd = circuitguard_cli();

    let output = cmd.arg("tables").output().unwrap();
    assert!(output.status.success());

    let tables: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tables["cables"]["installation_method"], "B2");
    assert_eq!(tables["constants"]["voltage_drop_limit_percent"], 3.0);
}
