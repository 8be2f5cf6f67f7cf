//! Exit codes and startup failures; none of these reach the network.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn postmirror_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("postmirror"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("GITHUB_AUTH_TOKEN");
    cmd
}

#[test]
fn version_flag_exits_zero() {
    let home = TempDir::new().expect("home");
    for flag in ["-v", "--version"] {
        postmirror_cmd(home.path())
            .arg(flag)
            .assert()
            .success()
            .stdout(contains("postmirror version"));
    }
}

#[test]
fn missing_backend_is_a_usage_error() {
    let home = TempDir::new().expect("home");
    postmirror_cmd(home.path())
        .assert()
        .failure()
        .stderr(contains("<BACKEND>"));
}

#[test]
fn unknown_backend_is_rejected() {
    let home = TempDir::new().expect("home");
    postmirror_cmd(home.path())
        .args(["--token", "t", "gitlab"])
        .assert()
        .failure()
        .stderr(contains("unsupported backend"));
}

#[test]
fn missing_token_fails_before_any_request() {
    let home = TempDir::new().expect("home");
    postmirror_cmd(home.path())
        .arg("github")
        .assert()
        .failure()
        .stderr(contains("GITHUB_AUTH_TOKEN"));
}

#[test]
fn blank_token_counts_as_missing() {
    let home = TempDir::new().expect("home");
    postmirror_cmd(home.path())
        .args(["--token", "   ", "github"])
        .assert()
        .failure()
        .stderr(contains("no access token"));
}

#[test]
fn zero_jobs_is_rejected() {
    let home = TempDir::new().expect("home");
    postmirror_cmd(home.path())
        .args(["--token", "t", "--jobs", "0", "github"])
        .assert()
        .failure()
        .stderr(contains("max_in_flight"));
}

#[test]
fn malformed_settings_file_is_reported() {
    let home = TempDir::new().expect("home");
    let dir = home.path().join(".postmirror");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), "max_in_flight: [1, 2]\n").expect("write settings");

    postmirror_cmd(home.path())
        .args(["--token", "t", "github"])
        .assert()
        .failure()
        .stderr(contains("config.yaml"));
}
