use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn cmd() -> Command {
    Command::cargo_bin("dmesg-scan").unwrap()
}

const LOG: &str = "\
[    0.000000] Linux version 6.1.0\n\
[    1.200000] pci 0000:00:1f.2: BAR 0: assigned\n\
[    2.500000] EXT4-fs ERROR on sda1\n\
[    3.100000] usb 1-1: new high-speed device\n\
[    4.700000] disk I/O FAILED, retrying\n";

#[test]
fn prints_only_matching_lines() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = write(dir.path(), "patterns.txt", "error\nfail.*retry\n");
    let log = write(dir.path(), "boot.log", LOG);

    cmd()
        .arg("--patterns")
        .arg(&patterns)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::eq(
            "[    2.500000] EXT4-fs ERROR on sda1\n\
             [    4.700000] disk I/O FAILED, retrying\n",
        ));
}

#[test]
fn matching_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = write(dir.path(), "patterns.txt", "BAR 0\n");
    let log = write(dir.path(), "boot.log", LOG);

    cmd()
        .arg("--patterns")
        .arg(&patterns)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("assigned"));
}

#[test]
fn line_matching_several_patterns_prints_once() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = write(dir.path(), "patterns.txt", "error\next4\nsda1\n");
    let log = write(dir.path(), "boot.log", LOG);

    cmd()
        .arg("--patterns")
        .arg(&patterns)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::eq("[    2.500000] EXT4-fs ERROR on sda1\n"));
}

#[test]
fn invalid_pattern_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = write(dir.path(), "patterns.txt", "([\nerror\n");
    let log = write(dir.path(), "boot.log", LOG);

    cmd()
        .arg("--patterns")
        .arg(&patterns)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("EXT4-fs ERROR"))
        .stderr(predicate::str::contains("skipping invalid pattern"));
}

#[test]
fn empty_pattern_lines_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = write(dir.path(), "patterns.txt", "\n\nerror\n\n");
    let log = write(dir.path(), "boot.log", LOG);

    cmd()
        .arg("--patterns")
        .arg(&patterns)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::eq("[    2.500000] EXT4-fs ERROR on sda1\n"));
}

#[test]
fn missing_patterns_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let log = write(dir.path(), "boot.log", LOG);

    cmd()
        .arg("--patterns")
        .arg(dir.path().join("nope.txt"))
        .arg("--log-file")
        .arg(&log)
        .assert()
        .failure()
        .stderr(predicate::str::contains("patterns file"));
}

#[test]
fn missing_log_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = write(dir.path(), "patterns.txt", "error\n");

    cmd()
        .arg("--patterns")
        .arg(&patterns)
        .arg("--log-file")
        .arg(dir.path().join("nope.log"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("log file"));
}
