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

fn put(dir: &TempDir, project: &str, key: &str, value: &str) {
    envault_cmd(dir)
        .args(["put", project, key])
        .write_stdin(value)
        .assert()
        .success();
}

#[test]
fn test_audit_show_records_mutations() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    put(&dir, "web", "API_KEY", "sk-1");
    put(&dir, "web", "API_KEY", "sk-2");
    envault_cmd(&dir)
        .args(["remove", "web", "API_KEY"])
        .assert()
        .success();

    envault_cmd(&dir)
        .args(["audit", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("web/API_KEY"))
        .stderr(predicate::str::contains("3 entries shown of 3 total"));
}

#[test]
fn test_audit_show_empty_log() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["audit", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No audit log entries"));
}

#[test]
fn test_audit_verify_intact_chain() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    put(&dir, "web", "API_KEY", "sk-1");
    put(&dir, "web", "DB_URL", "postgres://x");

    envault_cmd(&dir)
        .args(["audit", "verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entries, chain intact"));
}

#[test]
fn test_audit_verify_detects_tampering() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    put(&dir, "web", "API_KEY", "sk-1");

    let audit_path = dir.path().join("audit.log");
    let content = fs::read_to_string(&audit_path).unwrap();
    fs::write(&audit_path, content.replacen("API_KEY", "EVIL_KEY", 1)).unwrap();

    envault_cmd(&dir)
        .args(["audit", "verify"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("INTEGRITY FAILURE"));
}

#[test]
fn test_rotation_outcome_is_audited() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    put(&dir, "web", "API_KEY", "sk-1");

    envault_cmd(&dir)
        .args(["rotate", "web", "API_KEY"])
        .assert()
        .success();

    envault_cmd(&dir)
        .args(["audit", "show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"action\":\"rotate\""))
        .stdout(predicate::str::contains("\"outcome\":\"success\""));
}
