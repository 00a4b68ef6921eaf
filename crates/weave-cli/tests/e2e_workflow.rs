//! End-to-end tests for `wv`: the full workflow lifecycle through the binary,
//! including JSON output, error codes and exit statuses.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn wv_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("wv"));
    cmd.current_dir(dir);
    cmd.env("WEAVE_LOG", "error");
    cmd.env_remove("WEAVE_DB");
    cmd.env_remove("WEAVE_FORMAT");
    cmd
}

fn init_project() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    wv_cmd(dir.path()).args(["init"]).assert().success();
    dir
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = wv_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("run wv");
    assert!(
        output.status.success(),
        "wv {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn error_json(dir: &Path, args: &[&str], exit: i32) -> Value {
    let output = wv_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("run wv");
    assert_eq!(output.status.code(), Some(exit), "wv {args:?}");
    let stderr: Value = serde_json::from_slice(&output.stderr).expect("stderr is JSON");
    stderr["error"].clone()
}

/// `proj1` with `t1` (Design) and `t2` (Build, depends on `t1`).
fn alpha() -> TempDir {
    let dir = init_project();
    run_json(dir.path(), &["create", "proj1", "Alpha"]);
    run_json(dir.path(), &["add", "proj1", "t1", "--name", "Design"]);
    run_json(dir.path(), &["add", "proj1", "t2", "--name", "Build", "--dep", "t1"]);
    dir
}

#[test]
fn init_creates_config_and_store() {
    let dir = TempDir::new().expect("tempdir");
    let report = run_json(dir.path(), &["init"]);
    assert_eq!(report["config_written"], true);
    assert_eq!(report["schema_version"], 2);
    assert!(dir.path().join(".weave/config.toml").exists());
    assert!(dir.path().join(".weave/weave.sqlite3").exists());

    let again = run_json(dir.path(), &["init"]);
    assert_eq!(again["config_written"], false);
}

#[test]
fn commands_before_init_report_not_initialized() {
    let dir = TempDir::new().expect("tempdir");
    let err = error_json(dir.path(), &["list"], 6);
    assert_eq!(err["error_code"], "E1001");
    assert!(
        err["suggestion"]
            .as_str()
            .is_some_and(|s| s.contains("wv init"))
    );
}

#[test]
fn malformed_config_is_a_config_error() {
    let dir = init_project();
    std::fs::write(dir.path().join(".weave/config.toml"), "[store\n").expect("write");
    let err = error_json(dir.path(), &["list"], 6);
    assert_eq!(err["error_code"], "E1002");
}

#[test]
fn show_returns_tasks_with_dependencies() {
    let dir = alpha();
    let workflow = run_json(dir.path(), &["show", "proj1"]);
    assert_eq!(workflow["project_name"], "Alpha");
    let tasks = workflow["tasks"].as_array().expect("tasks array");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1]["id"], "t2");
    assert_eq!(tasks[1]["dependencies"], serde_json::json!(["t1"]));
    assert_eq!(tasks[1]["blocked"], false);
}

#[test]
fn blocking_flips_dependency_check() {
    let dir = alpha();
    let check = run_json(dir.path(), &["check", "proj1", "t2"]);
    assert_eq!(check["all_dependencies_met"], true);

    let change = run_json(dir.path(), &["block", "proj1", "t1"]);
    assert_eq!(change["to"], "blocked");

    let check = run_json(dir.path(), &["check", "proj1", "t2"]);
    assert_eq!(check["all_dependencies_met"], false);
    assert_eq!(check["unmet"], serde_json::json!(["t1"]));

    let blocked = run_json(dir.path(), &["blocked", "t1"]);
    assert_eq!(blocked["blocked"], true);

    run_json(dir.path(), &["unblock", "proj1", "t1"]);
    let check = run_json(dir.path(), &["check", "proj1", "t2"]);
    assert_eq!(check["all_dependencies_met"], true);
}

#[test]
fn unknown_dependency_is_not_found_and_adds_nothing() {
    let dir = alpha();
    let err = error_json(
        dir.path(),
        &["add", "proj1", "t3", "--name", "Test", "--dep", "t2", "--dep", "tX"],
        3,
    );
    assert_eq!(err["error_code"], "E2002");
    assert_eq!(err["class"], "not-found");

    let exists = run_json(dir.path(), &["exists", "t3"]);
    assert_eq!(exists["exists"], false);
}

#[test]
fn reverse_edge_is_a_cycle() {
    let dir = alpha();
    let err = error_json(dir.path(), &["link", "proj1", "t1", "t2"], 5);
    assert_eq!(err["error_code"], "E2005");
    assert!(err["message"].as_str().is_some_and(|m| m.contains("t1")));

    let linked = run_json(dir.path(), &["link", "proj1", "t2", "t1"]);
    assert_eq!(linked["added"], false);
}

#[test]
fn duplicate_workflow_is_already_exists() {
    let dir = alpha();
    let err = error_json(dir.path(), &["create", "proj1", "Again"], 4);
    assert_eq!(err["error_code"], "E2003");
}

#[test]
fn status_transitions_drive_readiness_and_order() {
    let dir = alpha();
    // Pending dependencies satisfy by default.
    let ready = run_json(dir.path(), &["ready", "proj1"]);
    assert_eq!(ready, serde_json::json!(["t1", "t2"]));

    std::fs::write(
        dir.path().join(".weave/config.toml"),
        "[graph]\nrequire_resolved = true\n",
    )
    .expect("write config");
    let ready = run_json(dir.path(), &["ready", "proj1"]);
    assert_eq!(ready, serde_json::json!(["t1"]));

    run_json(dir.path(), &["status", "proj1", "t1", "in_progress"]);
    run_json(dir.path(), &["status", "proj1", "t1", "done"]);
    let ready = run_json(dir.path(), &["ready", "proj1"]);
    assert_eq!(ready, serde_json::json!(["t2"]));

    let order = run_json(dir.path(), &["order", "proj1"]);
    assert_eq!(order, serde_json::json!(["t1", "t2"]));

    let err = error_json(dir.path(), &["block", "proj1", "t1"], 5);
    assert_eq!(err["error_code"], "E2007");
}

#[test]
fn delete_removes_workflow() {
    let dir = alpha();
    let deleted = run_json(dir.path(), &["delete", "proj1"]);
    assert_eq!(deleted["tasks"], 2);
    assert_eq!(deleted["edges"], 1);
    assert_eq!(deleted["foreign_edges"], 0);

    let err = error_json(dir.path(), &["show", "proj1"], 3);
    assert_eq!(err["error_code"], "E2001");
    let list = run_json(dir.path(), &["list"]);
    assert_eq!(list, serde_json::json!([]));
}

#[test]
fn usage_errors_and_missing_workflows_exit_differently() {
    let dir = alpha();
    wv_cmd(dir.path())
        .args(["show"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
    wv_cmd(dir.path())
        .args(["status", "proj1", "t1", "started"])
        .assert()
        .code(2);

    let err = error_json(dir.path(), &["show", "ghost"], 3);
    assert_eq!(err["class"], "not-found");
}

#[test]
fn text_output_is_tab_separated() {
    let dir = alpha();
    wv_cmd(dir.path())
        .args(["show", "proj1", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t2\tpending\tt1\tBuild"));
    wv_cmd(dir.path())
        .args(["list", "--format", "text"])
        .assert()
        .success()
        .stdout("proj1\t2\tAlpha\n");
}

#[test]
fn human_errors_show_code_and_suggestion() {
    let dir = alpha();
    wv_cmd(dir.path())
        .args(["create", "proj1", "Again", "--format", "text"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("error[E2003]"))
        .stderr(predicate::str::contains("suggestion:"));
}

#[test]
fn db_flag_overrides_configured_store() {
    let dir = init_project();
    let other = dir.path().join("elsewhere.sqlite3");
    wv_cmd(dir.path())
        .args(["list", "--db"])
        .arg(&other)
        .assert()
        .code(6)
        .stderr(predicate::str::contains("elsewhere.sqlite3"));

    // An override pointing at an initialized store works.
    wv_cmd(dir.path())
        .env("WEAVE_DB", ".weave/weave.sqlite3")
        .args(["create", "p", "Via env", "--format", "text"])
        .assert()
        .success()
        .stdout("p\tVia env\n");
}
