//! Integration tests for CLI commands.
//!
//! Tests that verify command functionality end-to-end. The `demo`
//! subcommand's full run is covered by `nodewarden-coordinator`'s own
//! scenario tests; these just check the surface the binary exposes.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn demo_help_shows_options() {
    Command::cargo_bin("nodewarden")
        .unwrap()
        .args(["demo", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--nodes"))
        .stdout(predicate::str::contains("--failover-delay-secs"))
        .stdout(predicate::str::contains("--kill-node"));
}

#[test]
fn config_help_shows_format_option() {
    Command::cargo_bin("nodewarden")
        .unwrap()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--format"));
}

#[test]
fn demo_runs_a_short_solo_cluster() {
    let temp = TempDir::new().unwrap();
    Command::cargo_bin("nodewarden")
        .unwrap()
        .env("HOME", temp.path())
        .args(["demo", "--nodes", "1", "--duration-secs", "1"])
        .assert()
        .success();
}

#[test]
fn demo_runs_a_short_two_node_cluster() {
    let temp = TempDir::new().unwrap();
    Command::cargo_bin("nodewarden")
        .unwrap()
        .env("HOME", temp.path())
        .args(["demo", "--nodes", "2", "--duration-secs", "2", "--failover-delay-secs", "5"])
        .assert()
        .success();
}
