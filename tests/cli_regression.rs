// Regression tests for the snapgate CLI
// Requires: assert_cmd, predicates crates in [dev-dependencies]

mod common;

use assert_cmd::Command;
use common::Workspace;
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn snapgate() -> Command {
    let mut cmd = Command::cargo_bin("snapgate").unwrap();
    cmd.env_remove("SNAPGATE_ROOT")
        .env_remove("SNAPGATE_UPDATE_IN_PLACE");
    cmd
}

fn workspace_with_candidate(method: &str, json: &str) -> Workspace {
    let ws = Workspace::new(method);
    let _ = ws.matcher().matches_json(json, false);
    ws
}

#[test]
fn pending_lists_candidates() {
    let ws = workspace_with_candidate("cli_pending", r#"{"a":1}"#);
    let id = ws.matcher().identity();
    snapgate()
        .arg("pending")
        .arg(ws.root())
        .assert()
        .success()
        .stdout(contains("1 pending artifact(s)").and(contains(id.not_approved_file_name())));
}

#[test]
fn pending_on_empty_root() {
    let ws = Workspace::new("cli_empty");
    snapgate()
        .arg("pending")
        .arg(ws.root())
        .assert()
        .success()
        .stdout(contains("No pending artifacts"));
}

#[test]
fn approve_all_promotes_candidates() {
    let ws = workspace_with_candidate("cli_approve", r#"{"a":1}"#);
    let matcher = ws.matcher();
    snapgate()
        .args(["approve", "--all", "--root"])
        .arg(ws.root())
        .assert()
        .success()
        .stdout(contains("approved"));

    assert!(ws.not_approved_files().is_empty());
    assert!(matcher.identity().approved_path().is_file());
    assert!(matcher.matches_json(r#"{"a":1}"#, false).is_ok());
}

#[test]
fn approve_refuses_to_clobber_without_force() {
    let ws = workspace_with_candidate("cli_clobber", r#"{"a":2}"#);
    let matcher = ws.matcher();
    let candidate = matcher.identity().not_approved_path();
    ws.approve(&matcher, r#"{"a":1}"#);

    snapgate()
        .arg("approve")
        .arg(&candidate)
        .assert()
        .failure()
        .stderr(contains("already exists").and(contains("--force")));

    snapgate()
        .args(["approve", "--force"])
        .arg(&candidate)
        .assert()
        .success();
    assert_eq!(
        common::read_json(&matcher.identity().approved_path()),
        serde_json::json!({"a": 2})
    );
}

#[test]
fn approve_without_files_is_a_diagnostic() {
    snapgate()
        .arg("approve")
        .assert()
        .failure()
        .stderr(contains("snapgate::config").or(contains("help:")));
}

#[test]
fn diff_shows_changed_lines() {
    let ws = Workspace::new("cli_diff");
    let matcher = ws.matcher();
    ws.approve(&matcher, "{\n  \"a\": 1\n}");
    let candidate = matcher.identity().not_approved_path();
    std::fs::write(&candidate, "/*x*/\n{\n  \"a\": 2\n}\n").unwrap();

    snapgate()
        .arg("diff")
        .arg(&candidate)
        .assert()
        .success()
        .stdout(contains("-  \"a\": 1").and(contains("+  \"a\": 2")));
}
