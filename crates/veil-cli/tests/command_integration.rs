//! Integration tests for CLI commands.
//!
//! Each test writes policy, attribute and context files into a temporary
//! project directory and runs the binary against them.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const POLICIES: &str = r#"
[[policy]]
id = "research-sp"
requirement = { type = "requester", value = "https://sp.example.org" }

[[policy.rule]]
attribute = "mail"
disposition = "permit"
matcher = { type = "any" }

[[policy.rule]]
attribute = "affiliation"
disposition = "permit"
matcher = { type = "value", regex = "member|staff" }

[[policy]]
id = "needs-issuer"
requirement = { type = "issuer", value = "https://idp.example.org" }

[[policy.rule]]
attribute = "uid"
disposition = "permit"
matcher = { type = "any" }
"#;

const ATTRIBUTES: &str = r#"[
    { "id": "mail", "values": ["alice@example.org"] },
    { "id": "affiliation", "values": ["member", "student"] },
    { "id": "uid", "values": ["alice"] }
]"#;

const CONTEXT: &str = r#"{ "requester_id": "https://sp.example.org" }"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn veil(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("veil").unwrap();
    cmd.arg("-C").arg(project.path());
    cmd
}

// ============================================================================
// check
// ============================================================================

#[test]
fn check_accepts_valid_policies() {
    let temp = TempDir::new().unwrap();
    let policies = write(temp.path(), "policies.toml", POLICIES);

    veil(&temp)
        .arg("check")
        .arg(&policies)
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: 2 policies from 1 file(s)"));
}

#[test]
fn check_uses_configured_files() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "release.toml", POLICIES);
    write(
        temp.path(),
        "veil.toml",
        "[policies]\nfiles = [\"release.toml\"]\n",
    );

    veil(&temp)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("OK: 2 policies"));
}

#[test]
fn check_rejects_invalid_regex() {
    let temp = TempDir::new().unwrap();
    let policies = write(
        temp.path(),
        "broken.toml",
        r#"
[[policy]]
id = "broken"
requirement = { type = "requester", regex = "(unclosed" }
"#,
    );

    veil(&temp)
        .arg("check")
        .arg(&policies)
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.toml"));
}

#[test]
fn check_is_strict_by_default() {
    let temp = TempDir::new().unwrap();
    let policies = write(
        temp.path(),
        "empty.toml",
        r#"
[[policy]]
id = "nobody"
requirement = { type = "or" }
"#,
    );

    veil(&temp)
        .arg("check")
        .arg(&policies)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nobody"));

    veil(&temp)
        .args(["check", "--lenient"])
        .arg(&policies)
        .assert()
        .success()
        .stdout(predicate::str::contains("warning:"));
}

#[test]
fn check_fails_on_malformed_project_config() {
    let temp = TempDir::new().unwrap();
    let policies = write(temp.path(), "policies.toml", POLICIES);
    write(temp.path(), "veil.toml", "[validation]\nstrict = \"maybe\"\n");

    veil(&temp)
        .arg("check")
        .arg(&policies)
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn check_reports_missing_file() {
    let temp = TempDir::new().unwrap();

    veil(&temp)
        .args(["check", "does-not-exist.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

// ============================================================================
// filter
// ============================================================================

#[test]
fn filter_prints_released_attributes() {
    let temp = TempDir::new().unwrap();
    let policies = write(temp.path(), "policies.toml", POLICIES);
    let attributes = write(temp.path(), "attributes.json", ATTRIBUTES);
    let context = write(temp.path(), "context.json", CONTEXT);

    let output = veil(&temp)
        .arg("filter")
        .arg("--policies")
        .arg(&policies)
        .arg("--attributes")
        .arg(&attributes)
        .arg("--context")
        .arg(&context)
        .output()
        .unwrap();
    assert!(output.status.success());

    let released: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        released,
        serde_json::json!([
            { "id": "mail", "values": ["alice@example.org"] },
            { "id": "affiliation", "values": ["member"] }
        ])
    );
}

#[test]
fn filter_report_shows_failed_activation() {
    let temp = TempDir::new().unwrap();
    let policies = write(temp.path(), "policies.toml", POLICIES);
    let attributes = write(temp.path(), "attributes.json", ATTRIBUTES);
    let context = write(temp.path(), "context.json", CONTEXT);

    let output = veil(&temp)
        .arg("filter")
        .arg("--policies")
        .arg(&policies)
        .arg("--attributes")
        .arg(&attributes)
        .arg("--context")
        .arg(&context)
        .arg("--report")
        .output()
        .unwrap();
    assert!(output.status.success());

    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let activations = &outcome["report"]["activations"];
    assert_eq!(activations[0]["policy_id"], "research-sp");
    assert_eq!(activations[0]["outcome"], "TRUE");
    assert_eq!(activations[1]["policy_id"], "needs-issuer");
    assert_eq!(activations[1]["outcome"], "FAIL");
    assert_eq!(outcome["report"]["decisions"][2]["released"], 0);
}

#[test]
fn filter_rejects_malformed_attributes() {
    let temp = TempDir::new().unwrap();
    let policies = write(temp.path(), "policies.toml", POLICIES);
    let attributes = write(temp.path(), "attributes.json", "{ not json");
    let context = write(temp.path(), "context.json", CONTEXT);

    veil(&temp)
        .arg("filter")
        .arg("--policies")
        .arg(&policies)
        .arg("--attributes")
        .arg(&attributes)
        .arg("--context")
        .arg(&context)
        .assert()
        .failure()
        .stderr(predicate::str::contains("attributes.json"));
}
