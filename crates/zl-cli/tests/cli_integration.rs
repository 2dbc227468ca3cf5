//! CLI integration tests
//!
//! Runs the zelland binary against a throwaway config directory.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn zelland(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("zelland")
        .expect("Failed to locate zelland binary - ensure it's built before running tests");
    cmd.env("ZELLAND_CONFIG_DIR", dir.path())
        .env_remove("ZELLAND_PASSWORD")
        .env_remove("ZELLAND_PASSPHRASE")
        .env_remove("RUST_LOG");
    cmd
}

/// Config pointing loopback hosts at themselves and probing a closed port
fn write_local_config(dir: &TempDir) {
    std::fs::write(
        dir.path().join("config.toml"),
        "[ssh]\nloopback_alias = \"127.0.0.1\"\nconnect_timeout = 5\n\n[probe]\nport = 1\ntimeout = 1000\n",
    )
    .unwrap();
}

fn add_devbox(dir: &TempDir, session: &str) {
    zelland(dir)
        .args(["add", "devbox", "--user", "alice", "--password", "hunter2", "--session", session])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added devbox (devbox)"));
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    zelland(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("zelland"))
        .stdout(predicate::str::contains("Remote terminal session manager"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    zelland(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("zelland"));
}

#[test]
fn test_cli_unknown_command() {
    let dir = TempDir::new().unwrap();
    zelland(&dir)
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_list_empty() {
    let dir = TempDir::new().unwrap();
    zelland(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions configured"));
}

#[test]
fn test_cli_add_and_list() {
    let dir = TempDir::new().unwrap();
    add_devbox(&dir, "My Work");

    zelland(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("devbox"))
        .stdout(predicate::str::contains("my-work"))
        .stdout(predicate::str::contains("Not connected"));

    let stored = std::fs::read_to_string(dir.path().join("sessions.json")).unwrap();
    assert!(stored.contains("my-work"));
    assert!(!stored.contains("hunter2"));
}

#[test]
fn test_cli_add_saves_secret_when_asked() {
    let dir = TempDir::new().unwrap();
    zelland(&dir)
        .args(["add", "devbox", "--user", "alice", "--password", "hunter2", "--save-secret"])
        .assert()
        .success();

    let stored = std::fs::read_to_string(dir.path().join("sessions.json")).unwrap();
    assert!(stored.contains("hunter2"));
}

#[test]
fn test_cli_add_duplicate_fails() {
    let dir = TempDir::new().unwrap();
    add_devbox(&dir, "work");

    zelland(&dir)
        .args(["add", "devbox", "--user", "alice", "--password", "pw", "--session", "WORK"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_cli_add_requires_credentials() {
    let dir = TempDir::new().unwrap();
    zelland(&dir)
        .args(["add", "devbox", "--user", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Password cannot be empty"));

    assert!(!dir.path().join("sessions.json").exists());
}

#[test]
fn test_cli_list_json() {
    let dir = TempDir::new().unwrap();
    add_devbox(&dir, "work");

    let output = zelland(&dir).args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());

    let sessions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["remote_session"], "work");
    assert!(sessions[0]["config"].get("secret").is_none());
}

#[test]
fn test_cli_disconnect_and_remove() {
    let dir = TempDir::new().unwrap();
    add_devbox(&dir, "work");

    zelland(&dir)
        .args(["disconnect", "work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disconnected devbox (devbox)"));

    zelland(&dir)
        .args(["remove", "work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed devbox (devbox)"));

    zelland(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions configured"));
}

#[test]
fn test_cli_unknown_session() {
    let dir = TempDir::new().unwrap();
    zelland(&dir)
        .args(["connect", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No session matches 'nope'"));
}

#[test]
fn test_cli_direct_connect_unreachable() {
    let dir = TempDir::new().unwrap();
    write_local_config(&dir);

    zelland(&dir)
        .args([
            "add", "localhost", "--user", "alice", "--password", "pw", "--session", "work",
            "--mode", "direct",
        ])
        .assert()
        .success();

    zelland(&dir)
        .args(["connect", "work"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Could not reach server at https://127.0.0.1:1/work",
        ));
}

#[test]
fn test_cli_test_reports_refused_ssh() {
    let dir = TempDir::new().unwrap();
    write_local_config(&dir);

    zelland(&dir)
        .args([
            "add", "127.0.0.1", "--port", "1", "--user", "alice", "--session", "work",
        ])
        .assert()
        .failure();

    zelland(&dir)
        .args([
            "add", "127.0.0.1", "--port", "1", "--user", "alice", "--password", "pw",
            "--session", "work",
        ])
        .assert()
        .success();

    zelland(&dir)
        .args(["test", "work", "--password", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Connection test failed"));
}

#[test]
fn test_cli_config_path() {
    let dir = TempDir::new().unwrap();
    zelland(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains("sessions.json"));
}

#[test]
fn test_cli_config_show() {
    let dir = TempDir::new().unwrap();
    write_local_config(&dir);

    zelland(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ssh]"))
        .stdout(predicate::str::contains("loopback_alias = \"127.0.0.1\""))
        .stdout(predicate::str::contains("binary = \"zellij\""));
}
