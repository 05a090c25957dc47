//! Focused CLI argument parsing tests.
//!
//! Tests that verify command-line argument parsing works correctly without
//! touching any policy files.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_command_succeeds() {
    Command::cargo_bin("veil")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("veil"));
}

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("veil")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("veil")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("attribute release"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("filter"));
}

#[test]
fn filter_requires_attributes_and_context() {
    Command::cargo_bin("veil")
        .unwrap()
        .arg("filter")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn filter_help_shows_options() {
    Command::cargo_bin("veil")
        .unwrap()
        .args(["filter", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--policies"))
        .stdout(predicate::str::contains("--attributes"))
        .stdout(predicate::str::contains("--context"))
        .stdout(predicate::str::contains("--report"));
}

#[test]
fn check_help_shows_lenient() {
    Command::cargo_bin("veil")
        .unwrap()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--lenient"));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("veil")
        .unwrap()
        .arg("release-everything")
        .assert()
        .failure();
}
