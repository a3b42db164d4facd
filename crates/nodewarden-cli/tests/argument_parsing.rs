//! Focused CLI argument parsing tests.
//!
//! Tests that verify command-line argument parsing works correctly without
//! running a full demo cluster.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("nodewarden")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nodewarden"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("nodewarden")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"));
}

#[test]
fn missing_subcommand_fails() {
    Command::cargo_bin("nodewarden").unwrap().assert().failure();
}

#[test]
fn config_command_defaults_to_text_output() {
    let temp = TempDir::new().unwrap();
    Command::cargo_bin("nodewarden")
        .unwrap()
        .env("HOME", temp.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("nodewarden configuration"));
}

#[test]
fn config_command_json_output_parses() {
    let temp = TempDir::new().unwrap();
    let output = Command::cargo_bin("nodewarden")
        .unwrap()
        .env("HOME", temp.path())
        .args(["config", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed.get("node").is_some());
}

#[test]
fn config_command_rejects_unknown_format_as_text() {
    // An unrecognized format string falls back to the text renderer rather
    // than erroring, matching `show`'s catch-all match arm.
    let temp = TempDir::new().unwrap();
    Command::cargo_bin("nodewarden")
        .unwrap()
        .env("HOME", temp.path())
        .args(["config", "--format", "nonsense"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nodewarden configuration"));
}

#[test]
fn demo_rejects_zero_nodes() {
    let temp = TempDir::new().unwrap();
    Command::cargo_bin("nodewarden")
        .unwrap()
        .env("HOME", temp.path())
        .args(["demo", "--nodes", "0", "--duration-secs", "1"])
        .assert()
        .failure();
}

#[test]
fn demo_rejects_out_of_range_kill_node() {
    let temp = TempDir::new().unwrap();
    Command::cargo_bin("nodewarden")
        .unwrap()
        .env("HOME", temp.path())
        .args(["demo", "--nodes", "2", "--kill-node", "5", "--duration-secs", "1"])
        .assert()
        .failure();
}
