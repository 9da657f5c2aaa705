//! E2E smoke tests driving the CLI binary against an isolated data dir.

use std::path::Path;
use std::process::Command;

/// Invoke the CLI with an isolated data directory, returning (stdout, code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "blockwarden-cli", "--quiet", "--"])
        .args(args)
        .env("BLOCKWARDEN_DATA_DIR", data_dir)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, code)
}

fn run_cli_success(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "CLI command failed: {args:?}");
    stdout
}

#[test]
fn settings_show_prints_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let stdout = run_cli_success(dir.path(), &["settings", "show"]);
    let settings: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(settings["enabled"], serde_json::json!(true));
    assert_eq!(settings["mode"], serde_json::json!("focus"));
    assert!(settings["blocked_hosts"].as_array().unwrap().len() > 0);
}

#[test]
fn hosts_add_and_remove_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let stdout = run_cli_success(dir.path(), &["hosts", "add", "https://www.Example.com/x"]);
    let hosts: Vec<String> = serde_json::from_str(&stdout).unwrap();
    assert!(hosts.contains(&"example.com".to_string()));

    let stdout = run_cli_success(dir.path(), &["hosts", "remove", "example.com"]);
    let hosts: Vec<String> = serde_json::from_str(&stdout).unwrap();
    assert!(!hosts.contains(&"example.com".to_string()));
}

#[test]
fn focus_start_and_stop() {
    let dir = tempfile::tempdir().unwrap();
    let stdout = run_cli_success(dir.path(), &["focus", "start", "1.5"]);
    let timer: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(timer["state"], serde_json::json!("running"));

    let stdout = run_cli_success(dir.path(), &["focus", "stop"]);
    let timer: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(timer["state"], serde_json::json!("inactive"));
}

#[test]
fn unblock_ledger_through_message_contract() {
    let dir = tempfile::tempdir().unwrap();
    run_cli_success(dir.path(), &["unblock", "add", "x.com", "10"]);

    let stdout = run_cli_success(dir.path(), &["unblock", "list"]);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["result"], serde_json::json!("unblocks"));
    assert_eq!(response["unblocks"][0]["domain"], serde_json::json!("x.com"));

    run_cli_success(dir.path(), &["unblock", "clear"]);
    let stdout = run_cli_success(dir.path(), &["unblock", "list"]);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["unblocks"].as_array().unwrap().len(), 0);
}

#[test]
fn invalid_mode_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (_, code) = run_cli(dir.path(), &["settings", "mode", "party"]);
    assert_ne!(code, 0);
}
