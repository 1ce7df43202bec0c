//! CLI integration tests
//!
//! Tests the meshgate CLI using assert_cmd. Nothing here needs the mesh API.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn meshgate() -> Command {
    let mut cmd = Command::cargo_bin("meshgate")
        .expect("Failed to locate meshgate binary - ensure it's built before running tests");
    cmd.env_remove("MESHGATE_TOKEN");
    cmd
}

#[test]
fn test_cli_help() {
    meshgate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("meshgate"))
        .stdout(predicate::str::contains("Mesh VPN client"));
}

#[test]
fn test_cli_version() {
    meshgate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("meshgate"));
}

#[test]
fn test_cli_up_help() {
    meshgate()
        .args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("relay:<id>"));
}

#[test]
fn test_cli_config_init_and_show() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    meshgate()
        .args(["--config", path, "config", "init"])
        .assert()
        .success();

    meshgate()
        .args(["--config", path, "config", "set", "api_token", "secret-token"])
        .assert()
        .success();

    meshgate()
        .args(["--config", path, "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api_base_url"))
        .stdout(predicate::str::contains("[PRESENT]"))
        .stdout(predicate::str::contains("secret-token").not());
}

#[test]
fn test_cli_networks_without_token() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.toml");

    meshgate()
        .args(["--config", path.to_str().unwrap(), "networks"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MESHGATE_TOKEN"));
}

#[test]
fn test_cli_invalid_exit_selection() {
    meshgate()
        .args(["exit-node", "set", "n1", "satellite:7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown exit node type"));
}

#[test]
fn test_cli_up_missing_network() {
    meshgate().arg("up").assert().failure();
}

#[test]
fn test_cli_status_without_runner() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    meshgate()
        .args(["--config", path, "config", "init"])
        .assert()
        .success();

    // state_dir is the temp dir, which holds no control token
    meshgate()
        .args(["--config", path, "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not been started"));
}

#[test]
fn test_cli_unknown_command() {
    meshgate()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
