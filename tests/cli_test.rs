//! Integration tests for the cascade binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn setup_project(config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let cascade_dir = temp.path().join(".cascade");
    fs::create_dir_all(&cascade_dir).unwrap();
    fs::write(cascade_dir.join("config.yml"), config).unwrap();
    temp
}

fn cascade(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(cargo_bin("cascade"));
    cmd.current_dir(dir).env("NO_COLOR", "1");
    cmd
}

const DIAMOND_CONFIG: &str = r#"
github:
  repository: acme/platform
modules:
  a: {}
  b:
    depends_on: [a]
  c:
    depends_on: [a]
  d:
    depends_on: [b, c]
"#;

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("cascade"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Dependency-ordered CI pipeline"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("cascade"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_without_config_exits_2() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    cascade(temp.path())
        .args(["list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No configuration found"));
    Ok(())
}

#[test]
fn cli_list_shows_modules() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(DIAMOND_CONFIG);
    cascade(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("d (d.yml)"))
        .stdout(predicate::str::contains("depends on: b, c"));
    Ok(())
}

#[test]
fn cli_list_json() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(DIAMOND_CONFIG);
    let output = cascade(temp.path()).args(["list", "--json"]).output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value.as_array().map(Vec::len), Some(4));
    assert_eq!(value[3]["moniker"], "d");
    assert_eq!(value[3]["depends_on"], json!(["b", "c"]));
    Ok(())
}

#[test]
fn cli_plan_json_levels() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(DIAMOND_CONFIG);
    let output = cascade(temp.path()).args(["plan", "--json", "d"]).output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["levels"], json!([["a"], ["b", "c"], ["d"]]));
    Ok(())
}

#[test]
fn cli_plan_human_output() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(DIAMOND_CONFIG);
    cascade(temp.path())
        .args(["plan", "b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 modules in 2 levels"))
        .stdout(predicate::str::contains("a (dependency)"));
    Ok(())
}

#[test]
fn cli_config_override() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let path = temp.path().join("modules.yml");
    fs::write(&path, "modules:\n  solo: {}\n")?;

    cascade(temp.path())
        .args(["plan", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 module in 1 level"));
    Ok(())
}

#[test]
fn cli_cycle_fails_before_running() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("modules:\n  x:\n    depends_on: [y]\n  y:\n    depends_on: [x]\n");
    cascade(temp.path())
        .args(["run", "--ref", "main"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Circular dependency detected"));
    Ok(())
}

#[test]
fn cli_missing_dependency_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("modules:\n  api:\n    depends_on: [core]\n");
    cascade(temp.path())
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown module 'core'"));
    Ok(())
}

#[test]
fn cli_unknown_module_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(DIAMOND_CONFIG);
    cascade(temp.path())
        .args(["plan", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown module: nope"));
    Ok(())
}

#[test]
fn cli_modules_conflict_with_changed_only() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(DIAMOND_CONFIG);
    cascade(temp.path())
        .args(["plan", "a", "--changed-only"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
    Ok(())
}

#[test]
fn cli_run_dry_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(DIAMOND_CONFIG);
    cascade(temp.path())
        .args(["run", "--dry-run", "--ref", "main", "c"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run on main"))
        .stdout(predicate::str::contains("Level 2/2"));
    Ok(())
}

#[test]
fn cli_completions() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("cascade"));
    cmd.args(["completions", "bash"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("cascade"));
    Ok(())
}

fn mock_module(server: &MockServer, module: &str, run_id: u64, conclusion: &str) {
    server.mock(|when, then| {
        when.method(POST).path(format!(
            "/repos/acme/platform/actions/workflows/{}.yml/dispatches",
            module
        ));
        then.status(204);
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/repos/acme/platform/actions/workflows/{}.yml/runs", module));
        then.status(200).json_body(json!({
            "workflow_runs": [{ "id": run_id, "created_at": chrono::Utc::now().to_rfc3339() }]
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/repos/acme/platform/actions/runs/{}", run_id));
        then.status(200).json_body(json!({
            "id": run_id,
            "created_at": chrono::Utc::now().to_rfc3339(),
            "status": "completed",
            "conclusion": conclusion
        }));
    });
}

fn github_config(server: &MockServer) -> String {
    format!(
        r#"
github:
  repository: acme/platform
  api_url: {}
  poll_interval_secs: 1
  trigger_retry:
    max_attempts: 2
    initial_delay_ms: 10
modules:
  core: {{}}
  api:
    depends_on: [core]
  web:
    depends_on: [api]
"#,
        server.base_url()
    )
}

#[test]
fn cli_run_against_github() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start();
    mock_module(&server, "core", 1, "success");
    mock_module(&server, "api", 2, "success");
    mock_module(&server, "web", 3, "success");
    let temp = setup_project(&github_config(&server));

    let output = cascade(temp.path())
        .args(["run", "--json", "--ref", "main"])
        .output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(value["success"], true);
    assert_eq!(value["modules"][2]["module"], "web");
    assert_eq!(value["modules"][2]["status"], "succeeded");
    Ok(())
}

#[test]
fn cli_run_stops_after_failed_level() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start();
    mock_module(&server, "core", 1, "success");
    mock_module(&server, "api", 2, "failure");
    let web = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/acme/platform/actions/workflows/web.yml/dispatches");
        then.status(204);
    });
    let temp = setup_project(&github_config(&server));

    cascade(temp.path())
        .args(["run", "--ref", "main"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("api: run 2 concluded failure"))
        .stderr(predicate::str::contains("Run failed: api failed, 1 skipped"));

    web.assert_calls(0);
    Ok(())
}

#[test]
fn cli_rejects_modules_sharing_a_workflow() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        "modules:\n  a:\n    workflow: ci.yml\n  b:\n    workflow: ci.yml\n",
    );
    cascade(temp.path())
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("both use workflow 'ci.yml'"));
    Ok(())
}
