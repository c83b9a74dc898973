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
fn test_init_creates_vault_files() {
    let dir = TempDir::new().unwrap();
    envault_cmd(&dir)
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Vault initialized"));

    assert!(dir.path().join("vault.json").exists());
    assert!(dir.path().join("identity.age").exists());
    assert!(dir.path().join("envault.toml").exists());
}

#[test]
fn test_init_twice_fails() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);
    envault_cmd(&dir).arg("init").assert().failure().code(5);
}

#[test]
fn test_put_get_roundtrip() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY"])
        .write_stdin("sk-test-123\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("stored at v1"));

    envault_cmd(&dir)
        .args(["get", "web", "API_KEY"])
        .assert()
        .success()
        .stdout("sk-test-123");
}

#[test]
fn test_put_update_bumps_version() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY"])
        .write_stdin("first")
        .assert()
        .success();
    envault_cmd(&dir)
        .args(["put", "web", "API_KEY"])
        .write_stdin("second")
        .assert()
        .success()
        .stderr(predicate::str::contains("v1 -> v2"));

    envault_cmd(&dir)
        .args(["get", "web", "API_KEY"])
        .assert()
        .success()
        .stdout("second");

    // The superseded version remains readable.
    envault_cmd(&dir)
        .args(["get", "web", "API_KEY", "--version", "1"])
        .assert()
        .success()
        .stdout("first");
}

#[test]
fn test_get_json_includes_metadata() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY", "--tag", "external"])
        .write_stdin("sk-1")
        .assert()
        .success();

    envault_cmd(&dir)
        .args(["get", "web", "API_KEY", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\":1"))
        .stdout(predicate::str::contains("\"value\":\"sk-1\""))
        .stdout(predicate::str::contains("external"));
}

#[test]
fn test_list_sorted_and_filtered() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    for (key, value) in [("DB_URL", "postgres://x"), ("API_KEY", "sk"), ("DB_PASSWORD", "pw")] {
        envault_cmd(&dir)
            .args(["put", "web", key])
            .write_stdin(value)
            .assert()
            .success();
    }

    let output = envault_cmd(&dir)
        .args(["list", "web"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listing = String::from_utf8(output).unwrap();
    let keys: Vec<&str> = listing
        .lines()
        .filter_map(|l| l.split('\t').next())
        .collect();
    assert_eq!(keys, vec!["API_KEY", "DB_PASSWORD", "DB_URL"]);

    envault_cmd(&dir)
        .args(["list", "web", "--prefix", "DB_"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DB_URL"))
        .stdout(predicate::str::contains("API_KEY").not());
}

#[test]
fn test_remove_then_get_fails() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY"])
        .write_stdin("sk")
        .assert()
        .success();
    envault_cmd(&dir)
        .args(["remove", "web", "API_KEY"])
        .assert()
        .success()
        .stderr(predicate::str::contains("removed"));

    envault_cmd(&dir)
        .args(["get", "web", "API_KEY"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_expected_version_conflict() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY"])
        .write_stdin("sk")
        .assert()
        .success();

    envault_cmd(&dir)
        .args(["put", "web", "API_KEY", "--expected-version", "3"])
        .write_stdin("other")
        .assert()
        .failure()
        .code(6);

    // Value unchanged by the conflicting write.
    envault_cmd(&dir)
        .args(["get", "web", "API_KEY"])
        .assert()
        .success()
        .stdout("sk");
}

#[test]
fn test_invalid_key_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    init_vault(&dir);

    envault_cmd(&dir)
        .args(["put", "web", "BAD KEY"])
        .write_stdin("v")
        .assert()
        .failure()
        .code(2);
}
