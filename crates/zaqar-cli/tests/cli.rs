//! Smoke tests for the `zaqar` binary.

use assert_cmd::Command;
use predicates::prelude::*;

/// A command isolated from any user configuration or credentials.
fn zaqar(config_home: &tempfile::TempDir) -> Command {
    let mut command = Command::cargo_bin("zaqar").expect("binary should build");
    command
        .env("HOME", config_home.path())
        .env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("ZAQAR_CONFIG")
        .env_remove("ZAQAR_URL")
        .env_remove("OS_MESSAGING_URL")
        .env_remove("OS_QUEUES_API_VERSION");
    command
}

/// Verify help lists the command groups.
#[test]
fn test_help() {
    let home = tempfile::tempdir().unwrap();

    zaqar(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("queue"))
        .stdout(predicate::str::contains("subscription"));
}

/// Verify the version flag.
#[test]
fn test_version() {
    let home = tempfile::tempdir().unwrap();

    zaqar(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

/// Verify unknown commands are rejected.
#[test]
fn test_unknown_command() {
    let home = tempfile::tempdir().unwrap();

    zaqar(&home).arg("frobnicate").assert().failure();
}

/// Verify a missing endpoint is a configuration error.
#[test]
fn test_missing_url() {
    let home = tempfile::tempdir().unwrap();

    zaqar(&home)
        .arg("ping")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("os-url"));
}

/// Verify an unsupported API version is an argument error.
#[test]
fn test_invalid_api_version() {
    let home = tempfile::tempdir().unwrap();

    zaqar(&home)
        .args(["--os-url", "http://127.0.0.1:9", "--os-queues-api-version", "3", "ping"])
        .assert()
        .code(4);
}

/// Verify an unreachable server is reported as not pingable.
#[test]
fn test_ping_unreachable() {
    let home = tempfile::tempdir().unwrap();

    zaqar(&home)
        .args(["--os-url", "http://127.0.0.1:9", "--format", "json", "ping"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pingable\": false"));
}

/// Verify shell completions are generated without an endpoint.
#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();

    zaqar(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("zaqar"));
}
