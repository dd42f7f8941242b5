//! Integration tests for reposweep-cli.
//!
//! Note: Tests use `unwrap`/`expect` which is acceptable in test code.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn reposweep_cmd() -> Command {
    cargo_bin_cmd!("reposweep")
}

#[test]
fn test_version_flag() {
    reposweep_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reposweep"));
}

#[test]
fn test_help_flag() {
    reposweep_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--filter-files"))
        .stdout(predicate::str::contains("--no-scan"));
}

#[test]
fn test_zero_threads_rejected() {
    reposweep_cmd()
        .args(["--threads", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--threads"));
}

#[test]
fn test_invalid_filter_rejected() {
    reposweep_cmd()
        .args(["--filter-files", "lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lots"));
}

#[test]
fn test_invalid_repo_fails_at_startup() {
    let temp = TempDir::new().expect("failed to create temp dir");

    reposweep_cmd()
        .args(["--no-scan", "-r", "gitlab.com/owner/repo", "-o"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("HINT"));
}

#[test]
fn test_invalid_lines_only_completes() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let out = temp.path().join("scans");

    reposweep_cmd()
        .args(["--no-scan", "--json", "-o"])
        .arg(&out)
        .write_stdin("not a repo\n\nhttps://gitlab.com/a/b\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"completed\":0"));

    assert!(out.is_dir());
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}

#[test]
fn test_missing_repo_file_completes_empty() {
    let temp = TempDir::new().expect("failed to create temp dir");

    reposweep_cmd()
        .args(["--no-scan", "-R"])
        .arg(temp.path().join("missing.txt"))
        .arg("-o")
        .arg(temp.path().join("out"))
        .assert()
        .success()
        .stderr(predicate::str::contains("missing.txt"));
}

#[test]
fn test_unusable_output_dir_fails() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let file = temp.path().join("file");
    std::fs::write(&file, b"x").unwrap();

    reposweep_cmd()
        .args(["--no-scan", "-r", "github.com/owner/repo", "-o"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("HINT"));
}
