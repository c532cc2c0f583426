//! Smoke tests for the Waypoint CLI.
//!
//! These tests verify basic CLI functionality:
//! - `wp --version` outputs version info
//! - `wp --help` outputs help text
//! - `wp` (no args) outputs valid JSON

mod common;

use assert_cmd::Command;
use common::TestEnv;
use predicates::prelude::*;

fn wp() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wp"))
}

#[test]
fn test_version_flag() {
    wp().arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wp"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    wp().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("journey"));
}

#[test]
fn test_no_args_shows_empty_forest() {
    let env = TestEnv::new();
    let json = env.wp_json(&[]);
    assert_eq!(json["journeys"].as_array().unwrap().len(), 0);
    assert!(json["active_journey"].is_null());
}

#[test]
fn test_no_args_does_not_create_waypoint_file() {
    let env = TestEnv::new();
    env.wp().assert().success();
    assert!(!env.waypoint_file().exists());
}

#[test]
fn test_human_empty_forest() {
    let env = TestEnv::new();
    env.wp()
        .arg("-H")
        .assert()
        .success()
        .stdout(predicate::str::contains("No journeys"));
}

#[test]
fn test_missing_workspace_flag_fails() {
    let env = TestEnv::new();
    env.wp()
        .args(["-C", "/definitely/not/a/workspace", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""));
}
