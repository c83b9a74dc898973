use assert_cmd::Command;
use predicates::prelude::*;
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
fn test_export_dotenv_format() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    put(&dir, "web", "API_KEY", "sk-123");
    put(&dir, "web", "GREETING", "hello world");

    envault_cmd(&dir)
        .args(["export", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("API_KEY=sk-123"))
        // Values with spaces get quoted.
        .stdout(predicate::str::contains("GREETING=\"hello world\""));
}

#[test]
fn test_export_json_format() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    put(&dir, "web", "API_KEY", "sk-123");

    envault_cmd(&dir)
        .args(["export", "web", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"key\": \"API_KEY\""))
        .stdout(predicate::str::contains("\"value\": \"sk-123\""));
}

#[test]
fn test_export_unknown_format_fails() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    put(&dir, "web", "API_KEY", "sk-123");

    envault_cmd(&dir)
        .args(["export", "web", "--format", "yaml"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_export_without_project_or_backup_fails() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir).arg("export").assert().failure().code(2);
}

#[test]
fn test_backup_and_restore_roundtrip() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    put(&dir, "web", "API_KEY", "sk-123");
    put(&dir, "jobs", "QUEUE_URL", "amqp://q");

    let backup = dir.path().join("vault.backup");
    envault_cmd(&dir)
        .args(["export", "--backup", backup.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Backup written"));

    // The backup is sealed, not plaintext JSON.
    let body = std::fs::read(&backup).unwrap();
    assert!(!body.windows(6).any(|w| w == b"sk-123"));

    envault_cmd(&dir)
        .args(["remove", "web", "API_KEY"])
        .assert()
        .success();

    envault_cmd(&dir)
        .args(["restore", backup.to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("restored"));

    envault_cmd(&dir)
        .args(["get", "web", "API_KEY"])
        .assert()
        .success()
        .stdout("sk-123");
    envault_cmd(&dir)
        .args(["get", "jobs", "QUEUE_URL"])
        .assert()
        .success()
        .stdout("amqp://q");
}
