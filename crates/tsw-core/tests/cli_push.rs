//! End-to-end tests for the `tsw` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn tsw() -> Command {
    let mut cmd = Command::cargo_bin("tsw").expect("tsw binary should exist");
    cmd.env_remove("TSW_CONFIG")
        .env_remove("TSW_RETRIES")
        .env_remove("TSW_PUSH_MODE")
        .env_remove("RUST_LOG")
        .env_remove("TSW_LOG");
    cmd
}

const PAYLOAD: &str = r#"{
  "tables": [{
    "name": "trades",
    "columns": [
      {"name": "px", "type": "double"},
      {"name": "venue", "type": "symbol", "symtable": "venues"}
    ],
    "index": [1700000000000000000, 1700000001000000000],
    "data": [
      {"dtype": "float64", "values": [101.5, null]},
      {"dtype": "unicode", "values": ["XNYS", "XLON"]}
    ]
  }]
}"#;

fn write_payload(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("payload.json");
    std::fs::write(&path, PAYLOAD).unwrap();
    path
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ============================================================================
// Push
// ============================================================================

#[test]
fn push_prints_outcome_and_batches() {
    let dir = tempfile::tempdir().unwrap();
    let payload = write_payload(dir.path());

    let output = tsw().args(["-q", "push"]).arg(&payload).output().unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["outcome"]["rows"], 2);
    assert_eq!(json["outcome"]["attempts"], 1);
    assert_eq!(json["batches"][0]["table"], "trades");
    assert_eq!(json["batches"][0]["columns"][1]["type"], "string");
}

#[test]
fn push_truncate_reports_range() {
    let dir = tempfile::tempdir().unwrap();
    let payload = write_payload(dir.path());

    let output = tsw()
        .args(["-q", "push", "--mode", "truncate"])
        .arg(&payload)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(
        json["batches"][0]["truncate_ranges"][0]["end"]["tv_nsec"],
        1
    );
}

#[test]
fn push_retries_simulated_pipe_full() {
    let dir = tempfile::tempdir().unwrap();
    let payload = write_payload(dir.path());

    let output = tsw()
        .args([
            "-q",
            "push",
            "--retries",
            "2",
            "--retry-delay",
            "1",
            "--simulate",
            "pipe_full",
        ])
        .arg(&payload)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["outcome"]["attempts"], 2);
    assert_eq!(json["metrics"]["batch_push"]["count"], 2);
    assert!(json["outcome"]["elapsed_ms"].as_f64().unwrap() >= 0.0);
}

#[test]
fn push_without_retries_reports_store_busy() {
    let dir = tempfile::tempdir().unwrap();
    let payload = write_payload(dir.path());

    tsw()
        .args(["-q", "push", "--simulate", "try_again"])
        .arg(&payload)
        .assert()
        .code(3)
        .stdout(predicate::str::contains("\"category\":\"store\""));
}

#[test]
fn push_truncate_with_dedup_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let payload = write_payload(dir.path());

    tsw()
        .args([
            "-q",
            "push",
            "--mode",
            "truncate",
            "--dedup",
            "*",
            "--dedup-mode",
            "drop",
        ])
        .arg(&payload)
        .assert()
        .code(10)
        .stdout(predicate::str::contains("deduplicate"));
}

#[test]
fn push_missing_payload_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    tsw()
        .args(["-q", "push"])
        .arg(dir.path().join("absent.json"))
        .assert()
        .code(21);
}

#[test]
fn unknown_push_mode_fails() {
    tsw()
        .args(["push", "payload.json", "--mode", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn check_config_accepts_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tsw.toml");
    std::fs::write(&path, "[defaults]\npush_mode = \"fast\"\nretries = 2\n").unwrap();

    let output = tsw()
        .args(["-q", "check-config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["valid"], true);
    assert_eq!(json["defaults"]["push_mode"], "fast");
}

#[test]
fn check_config_rejects_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tsw.toml");
    std::fs::write(&path, "[defaults]\nretry_jitter = 4.0\n").unwrap();

    tsw()
        .args(["-q", "check-config"])
        .arg(&path)
        .assert()
        .code(11);
}

#[test]
fn config_defaults_apply_to_push() {
    let dir = tempfile::tempdir().unwrap();
    let payload = write_payload(dir.path());
    let config = dir.path().join("tsw.toml");
    std::fs::write(&config, "[defaults]\npush_mode = \"async\"\n").unwrap();

    let output = tsw()
        .arg("--config")
        .arg(&config)
        .args(["-q", "push"])
        .arg(&payload)
        .output()
        .unwrap();
    assert!(output.status.success());
}
