//! Smoke tests for command wiring and configuration errors

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

const ENV_KEYS: &[&str] = &[
    "FISUFBA_CONFIG",
    "FISUFBA_BIND",
    "FISUFBA_DB_HOST",
    "FISUFBA_DB_PORT",
    "FISUFBA_DB_USER",
    "FISUFBA_DB_PASSWORD",
    "FISUFBA_DB_NAME",
];

/// `fisufba` run from an empty directory with no FISUFBA_* variables.
fn fisufba(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fisufba").unwrap();
    cmd.current_dir(dir.path());
    for key in ENV_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    fisufba(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("provision"));
}

#[test]
fn test_serve_help() {
    let dir = tempfile::tempdir().unwrap();
    fisufba(&dir)
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Address to bind to"))
        .stdout(predicate::str::contains("--cors-permissive"));
}

#[test]
fn test_provision_help() {
    let dir = tempfile::tempdir().unwrap();
    fisufba(&dir)
        .args(["provision", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-admin"));
}

#[test]
fn test_missing_setting_is_named() {
    let dir = tempfile::tempdir().unwrap();
    fisufba(&dir)
        .arg("provision")
        .assert()
        .failure()
        .stderr(predicate::str::contains("database.host"))
        .stderr(predicate::str::contains("FISUFBA_DB_HOST"));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[database]\nhost = \"db\"\nport = \"not a number\"").unwrap();

    fisufba(&dir)
        .arg("--config")
        .arg(&path)
        .arg("serve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config file"));
}

#[test]
fn test_missing_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fisufba(&dir)
        .args(["--config", "does-not-exist.toml", "serve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn test_unreachable_database_fails_provision() {
    let dir = tempfile::tempdir().unwrap();
    fisufba(&dir)
        .arg("provision")
        .env("FISUFBA_DB_HOST", "127.0.0.1")
        .env("FISUFBA_DB_PORT", "1")
        .env("FISUFBA_DB_USER", "fisufba")
        .env("FISUFBA_DB_PASSWORD", "secret")
        .env("FISUFBA_DB_NAME", "fisufba")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provisioning failed"));
}
