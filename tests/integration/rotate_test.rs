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

#[test]
fn test_rotate_installs_a_new_version() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY"])
        .write_stdin("original-value")
        .assert()
        .success();

    envault_cmd(&dir)
        .args(["rotate", "web", "API_KEY"])
        .assert()
        .success()
        .stderr(predicate::str::contains("rotated to v2"));

    // The old value survives in history; the new one is generated.
    envault_cmd(&dir)
        .args(["get", "web", "API_KEY", "--version", "1"])
        .assert()
        .success()
        .stdout("original-value");
    envault_cmd(&dir)
        .args(["get", "web", "API_KEY"])
        .assert()
        .success()
        .stdout(predicate::str::is_match("^[A-Za-z0-9_-]{32}$").unwrap());
}

#[test]
fn test_rotate_json_reports_job() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY"])
        .write_stdin("v1")
        .assert()
        .success();

    envault_cmd(&dir)
        .args(["rotate", "web", "API_KEY", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state\":\"committed\""))
        .stdout(predicate::str::contains("\"new_version\":2"));
}

#[test]
fn test_rotate_missing_secret_fails() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["rotate", "web", "GHOST"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("target missing"));
}

#[test]
fn test_due_lists_interval_secrets() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY", "--every", "30d"])
        .write_stdin("sk")
        .assert()
        .success();
    envault_cmd(&dir)
        .args(["put", "web", "STATIC_KEY"])
        .write_stdin("sk")
        .assert()
        .success();

    // Nothing due yet.
    envault_cmd(&dir)
        .arg("due")
        .assert()
        .success()
        .stderr(predicate::str::contains("No secrets due"));

    // Looking 31 days ahead picks up the interval key only.
    envault_cmd(&dir)
        .args(["due", "--within", "31d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web/API_KEY"))
        .stdout(predicate::str::contains("STATIC_KEY").not());
}

#[test]
fn test_invalid_interval_is_rejected() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY", "--every", "sometimes"])
        .write_stdin("sk")
        .assert()
        .failure()
        .code(2);
}
