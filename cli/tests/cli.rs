//! Subprocess-driven CLI tests, spawning the built `pat` binary against
//! scratch ledger/keyring files, in the same style as the standalone
//! verifier's `tests/verify.rs`.

use std::path::PathBuf;
use std::process::{Command, Output};

fn binary_path() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_pat")
        .map(PathBuf::from)
        .expect("CARGO_BIN_EXE_pat should be set by cargo for integration tests")
}

fn run(log: &PathBuf, keys: &PathBuf, args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(["--log-path", log.to_str().unwrap(), "--keyring-path", keys.to_str().unwrap(), "--format", "json"])
        .args(args)
        .output()
        .expect("failed to invoke pat binary")
}

#[test]
fn submit_low_stakes_action_permits() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log.jsonl");
    let keys = dir.path().join("keys.json");

    let out = run(
        &log,
        &keys,
        &[
            "submit",
            "--prompt",
            "drone near perimeter",
            "--output",
            "Notify. confidence: 0.92",
            "--action",
            "NOTIFY",
            "--target",
            "SITE_SECURITY",
        ],
    );

    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["decision"]["result"], "PERMITTED");
}

#[test]
fn submit_then_verify_reports_clean_chain() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log.jsonl");
    let keys = dir.path().join("keys.json");

    let submit_out = run(
        &log,
        &keys,
        &["submit", "--prompt", "p", "--output", "confidence: 0.9", "--action", "NOOP", "--target", "X"],
    );
    assert!(submit_out.status.success());

    let verify_out = run(&log, &keys, &["verify"]);
    assert!(verify_out.status.success());
    let value: serde_json::Value = serde_json::from_str(&String::from_utf8_lossy(&verify_out.stdout)).unwrap();
    assert_eq!(value["ok"], true);
}

#[test]
fn approve_unknown_event_id_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log.jsonl");
    let keys = dir.path().join("keys.json");

    let out = run(&log, &keys, &["approve", "--event-id", "does-not-exist", "--approver-id", "j.wells"]);
    assert!(!out.status.success());
}

#[test]
fn keys_new_then_list_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("log.jsonl");
    let keys = dir.path().join("keys.json");

    let new_out = run(&log, &keys, &["keys", "new", "--approver-id", "alice"]);
    assert!(new_out.status.success());

    let list_out = run(&log, &keys, &["keys", "list"]);
    assert!(list_out.status.success());
    let value: serde_json::Value = serde_json::from_str(&String::from_utf8_lossy(&list_out.stdout)).unwrap();
    assert_eq!(value, serde_json::json!(["alice"]));
}
