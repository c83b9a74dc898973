use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn envault_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("envault").unwrap();
    cmd.env("ENVAULT_DIR", dir.path());
    cmd
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    envault_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("envault"));
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    envault_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("put"))
        .stdout(predicate::str::contains("rotate"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("audit"));
}

#[test]
fn test_uninitialized_vault_error() {
    let dir = TempDir::new().unwrap();
    envault_cmd(&dir)
        .args(["get", "web", "API_KEY"])
        .assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_json_error_output() {
    let dir = TempDir::new().unwrap();
    envault_cmd(&dir)
        .args(["get", "web", "API_KEY", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"code\""))
        .stdout(predicate::str::contains("vault_not_initialized"));
}

#[test]
fn test_unknown_command_fails() {
    let dir = TempDir::new().unwrap();
    envault_cmd(&dir).arg("frobnicate").assert().failure();
}
