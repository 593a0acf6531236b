//! Integration tests for argument parsing, config errors and the agent
//! commands against an unreachable server.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn iris_update() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("iris-update"));
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("IRIS_UPDATE_CONFIG");
    cmd.env_remove("IRIS_UPDATE_PUBLISH_CONFIG");
    cmd
}

/// A port nothing listens on.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

fn write_agent_config(dir: &std::path::Path, port: u16) -> std::path::PathBuf {
    let path = dir.join("agent.yaml");
    let install = dir.join("opt").join("irispanel");
    std::fs::create_dir_all(&install).expect("mkdir");
    std::fs::write(
        &path,
        format!(
            "server_url: http://127.0.0.1:{port}\n\
             install_dir: {}\n\
             managed_service_name: irispanel-test\n\
             current_version: 2\n\
             use_sudo: false\n\
             request_timeout_seconds: 2\n",
            install.display()
        ),
    )
    .expect("write config");
    path
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    iris_update().assert().code(2).stderr(predicate::str::contains(
        "Release publisher and self-applying update agent",
    ));
}

#[test]
fn test_cli_help_flag_lists_commands() {
    iris_update()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("agent"));
}

#[test]
fn test_agent_help_lists_subcommands() {
    iris_update()
        .args(["agent", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("once"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    iris_update()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("iris-update"));
}

#[test]
fn test_version_command_shows_version() {
    iris_update()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(concat!(
            "iris-update ",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let output = iris_update()
        .args(["version", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_unknown_command_fails() {
    iris_update().arg("deploy").assert().code(2);
}

// --- Config errors ---

#[test]
fn test_agent_once_missing_config_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    iris_update()
        .args(["agent", "once", "--config"])
        .arg(dir.path().join("missing.yaml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Config not found"));
}

#[test]
fn test_agent_config_env_var_is_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    iris_update()
        .args(["agent", "once"])
        .env("IRIS_UPDATE_CONFIG", dir.path().join("from-env.yaml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("from-env.yaml"));
}

#[test]
fn test_agent_once_missing_config_json_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = iris_update()
        .args(["--json", "agent", "once", "--config"])
        .arg(dir.path().join("missing.yaml"))
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "config_error");
}

#[test]
fn test_agent_once_invalid_server_url_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("agent.yaml");
    std::fs::write(&path, "server_url: updates.lan\ninstall_dir: /opt/irispanel\n").expect("write");
    iris_update()
        .args(["agent", "once", "--config"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("server_url"));
}

// --- Agent against an unreachable server ---

#[test]
fn test_agent_once_unreachable_server_is_not_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_agent_config(dir.path(), closed_port());

    let output = iris_update()
        .args(["--json", "agent", "once", "--config"])
        .arg(&config)
        .output()
        .expect("run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert!(
        value["outcome"]
            .as_str()
            .is_some_and(|s| s.starts_with("check failed")),
        "got {value}"
    );
    assert_eq!(value["current_version"], 2);
    assert!(value["committed"].is_null());
}

#[test]
fn test_agent_status_reports_unreachable_server() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_agent_config(dir.path(), closed_port());

    let output = iris_update()
        .args(["--json", "agent", "status", "--config"])
        .arg(&config)
        .output()
        .expect("run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["current_version"], 2);
    assert_eq!(value["service"], "irispanel-test");
    assert!(value["latest_version"].is_null());
    assert!(value["server_error"].is_string());
}
