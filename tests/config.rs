//! Configuration file tests

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn surge() -> Command {
    Command::cargo_bin("surge").unwrap()
}

#[test]
fn minimal_config_validates() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");

    fs::write(
        &config,
        r#"
[target]
url = "https://example.com/api"

[load]
workers = 4
duration = "5s"
"#,
    )
    .unwrap();

    surge()
        .args(["run", "-f", config.to_str().unwrap(), "--dry-run"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Configuration validated"))
        .stderr(predicate::str::contains("Workers:     4"))
        .stderr(predicate::str::contains("5s"));
}

#[test]
fn cli_flags_override_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");

    fs::write(
        &config,
        r#"
[target]
url = "https://example.com/api"
method = "PUT"

[load]
rps = 50
"#,
    )
    .unwrap();

    surge()
        .args([
            "run",
            "-f",
            config.to_str().unwrap(),
            "-m",
            "delete",
            "-r",
            "7",
            "--dry-run",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("Method:      DELETE"))
        .stderr(predicate::str::contains("RPS:         7"));
}

#[test]
fn env_vars_are_interpolated() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");

    fs::write(
        &config,
        r#"
[target]
url = "http://${SURGE_IT_HOST}/${SURGE_IT_PATH:-ping}"
"#,
    )
    .unwrap();

    surge()
        .env("SURGE_IT_HOST", "svc.internal:9000")
        .env_remove("SURGE_IT_PATH")
        .args(["run", "-f", config.to_str().unwrap(), "--dry-run"])
        .assert()
        .success()
        .stderr(predicate::str::contains("http://svc.internal:9000/ping"));
}

#[test]
fn missing_env_var_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");

    fs::write(&config, "[target]\nurl = \"${SURGE_IT_NOT_SET}\"\n").unwrap();

    surge()
        .env_remove("SURGE_IT_NOT_SET")
        .args(["run", "-f", config.to_str().unwrap(), "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SURGE_IT_NOT_SET"));
}

#[test]
fn unknown_key_fails_to_parse() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");

    fs::write(
        &config,
        "[target]\nurl = \"http://x/\"\n[load]\nconcurrency = 5\n",
    )
    .unwrap();

    surge()
        .args(["run", "-f", config.to_str().unwrap(), "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn missing_config_file_fails() {
    surge()
        .args(["run", "-f", "/nonexistent/surge.toml", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to read config file"));
}
