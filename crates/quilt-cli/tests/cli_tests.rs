//! Tests for the non-apply surface: help, config, init, completions.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn quilt(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("quilt").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("QUILT_GIT__PROGRAM")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    quilt(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn version_flag() {
    let dir = TempDir::new().unwrap();
    quilt(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let dir = TempDir::new().unwrap();
    quilt(&dir).arg("frobnicate").assert().code(2);
}

#[test]
fn init_then_read_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/quilt.toml");

    quilt(&dir)
        .arg("init")
        .arg("-c")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration created"));
    assert!(fs::read_to_string(&path).unwrap().contains("program = \"git\""));

    quilt(&dir)
        .args(["config", "get", "defaults.manifest", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout("Gemfile\n");

    quilt(&dir)
        .arg("init")
        .arg("-c")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_force_overwrites() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quilt.toml");
    fs::write(&path, "[git]\nprogram = \"old-git\"\n").unwrap();

    quilt(&dir)
        .args(["init", "--force", "-c"])
        .arg(&path)
        .assert()
        .success();
    assert!(!fs::read_to_string(&path).unwrap().contains("old-git"));
}

#[test]
fn environment_overrides_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quilt.toml");
    fs::write(&path, "[git]\nprogram = \"file-git\"\n").unwrap();

    quilt(&dir)
        .args(["config", "get", "git.program", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout("file-git\n");

    quilt(&dir)
        .env("QUILT_GIT__PROGRAM", "env-git")
        .args(["config", "get", "git.program", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout("env-git\n");
}

#[test]
fn config_path_reports_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quilt.toml");
    fs::write(&path, "").unwrap();

    quilt(&dir)
        .args(["config", "path", "-c"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("quilt.toml"));
}

#[test]
fn config_list_as_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quilt.toml");
    fs::write(&path, "[defaults.options]\ndatabase = \"sqlite3\"\n").unwrap();

    let assert = quilt(&dir)
        .args(["config", "list", "--output-format", "json", "-c"])
        .arg(&path)
        .assert()
        .success();
    let value: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(value["defaults"]["options"]["database"], "sqlite3");
    assert_eq!(value["git"]["program"], "git");
}

#[test]
fn unknown_config_key_exits_with_configuration_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quilt.toml");
    fs::write(&path, "").unwrap();

    quilt(&dir)
        .args(["config", "get", "no.such.key", "-c"])
        .arg(&path)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn missing_explicit_config_file_exits_with_configuration_code() {
    let dir = TempDir::new().unwrap();
    quilt(&dir)
        .args(["config", "list", "-c"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn malformed_config_file_exits_with_configuration_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quilt.toml");
    fs::write(&path, "[git\nprogram = ").unwrap();

    quilt(&dir)
        .args(["config", "list", "-c"])
        .arg(&path)
        .assert()
        .code(4);
}

#[test]
fn bash_completions_mention_the_binary() {
    let dir = TempDir::new().unwrap();
    quilt(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quilt"))
        .stdout(predicate::str::contains("apply"));
}

#[test]
fn no_color_accepts_conventional_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quilt.toml");
    fs::write(&path, "").unwrap();

    for value in ["1", "true", "yes", "0"] {
        quilt(&dir)
            .env("NO_COLOR", value)
            .args(["config", "path", "-c"])
            .arg(&path)
            .assert()
            .success();
    }
}
