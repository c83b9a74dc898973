use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn envault_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("envault").unwrap();
    cmd.env("ENVAULT_DIR", dir.path());
    cmd
}

fn init_vault(dir: &TempDir) {
    envault_cmd(dir).arg("init").assert().success();
}

#[test]
fn test_import_basic() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    let env_file = dir.path().join("test.env");
    fs::write(&env_file, "API_KEY=abc123\n# comment\nDB_URL=\"postgres://x\"\n").unwrap();

    envault_cmd(&dir)
        .args(["import", "production", env_file.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 secret(s) imported, 0 skipped"));

    envault_cmd(&dir)
        .args(["get", "production", "API_KEY"])
        .assert()
        .success()
        .stdout("abc123");

    // Quotes are stripped on the way in.
    envault_cmd(&dir)
        .args(["get", "production", "DB_URL"])
        .assert()
        .success()
        .stdout("postgres://x");
}

#[test]
fn test_import_is_idempotent_without_overwrite() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    let env_file = dir.path().join("test.env");
    fs::write(&env_file, "API_KEY=abc123\nDB_URL=postgres://x\n").unwrap();
    let path = env_file.to_str().unwrap();

    envault_cmd(&dir)
        .args(["import", "production", path])
        .assert()
        .success()
        .stderr(predicate::str::contains("2 secret(s) imported, 0 skipped"));

    envault_cmd(&dir)
        .args(["import", "production", path])
        .assert()
        .success()
        .stderr(predicate::str::contains("0 secret(s) imported, 2 skipped"));

    envault_cmd(&dir)
        .args(["get", "production", "API_KEY", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\":1"));
}

#[test]
fn test_import_overwrite_creates_new_versions() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    let env_file = dir.path().join("test.env");
    fs::write(&env_file, "API_KEY=abc123\n").unwrap();
    let path = env_file.to_str().unwrap();

    envault_cmd(&dir).args(["import", "production", path]).assert().success();
    envault_cmd(&dir)
        .args(["import", "production", path, "--overwrite"])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 secret(s) imported"));

    envault_cmd(&dir)
        .args(["get", "production", "API_KEY", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\":2"));
}

#[test]
fn test_import_counts_malformed_lines() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    let env_file = dir.path().join("test.env");
    fs::write(&env_file, "not a pair\nGOOD=1\nanother bad line\n").unwrap();

    envault_cmd(&dir)
        .args(["import", "web", env_file.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 secret(s) imported"))
        .stderr(predicate::str::contains("2 malformed line(s) ignored"));
}

#[test]
fn test_import_from_stdin() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["import", "web", "-"])
        .write_stdin("TOKEN=t-123\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("1 secret(s) imported"));

    envault_cmd(&dir)
        .args(["get", "web", "TOKEN"])
        .assert()
        .success()
        .stdout("t-123");
}

#[test]
fn test_import_json_report() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["import", "web", "-", "--json"])
        .write_stdin("A=1\nB=2\nbroken\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported\":2"))
        .stdout(predicate::str::contains("\"skipped\":0"))
        .stdout(predicate::str::contains("\"malformed\":1"));
}
