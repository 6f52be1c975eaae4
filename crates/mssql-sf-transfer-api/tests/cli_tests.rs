//! CLI tests for mssql-sf-transfer-api.
//!
//! Verify argument parsing, help output, and version reporting. Server
//! behavior needs live AWS/warehouse endpoints and is not exercised here.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the service binary.
fn cmd() -> Command {
    Command::cargo_bin("mssql-sf-transfer-api").unwrap()
}

#[test]
fn test_help_shows_all_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--aws-region"))
        .stdout(predicate::str::contains("--log-group"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("--verbosity"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mssql-sf-transfer-api"));
}

#[test]
fn test_unknown_flag_fails() {
    cmd()
        .arg("--definitely-not-a-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}
