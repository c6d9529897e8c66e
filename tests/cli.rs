//! End-to-end tests for the pakr binary.
//!
//! Each test stages files in a temp directory, runs the real binary there,
//! and checks the produced archive or the error output.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pakr(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pakr").unwrap();
    cmd.current_dir(dir);
    cmd
}

/// A staging tree with a binary, a config file, and a doc file.
fn stage() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("out")).unwrap();
    fs::create_dir_all(tmp.path().join("conf")).unwrap();
    fs::write(tmp.path().join("out/tool"), "#!/bin/sh\necho hi\n").unwrap();
    fs::write(tmp.path().join("conf/tool.conf"), "key=value\n").unwrap();
    tmp
}

#[test]
fn builds_a_deb_with_the_conventional_name() {
    let tmp = stage();
    pakr(tmp.path())
        .args(["-t", "deb", "-n", "tool", "-v", "1.0", "-a", "amd64"])
        .args(["out/tool=/usr/bin/tool", "conf/=/etc/tool/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created package: tool_1.0-1_amd64.deb"));

    let bytes = fs::read(tmp.path().join("tool_1.0-1_amd64.deb")).unwrap();
    assert!(bytes.starts_with(b"!<arch>\n"));
    let listing = String::from_utf8_lossy(&bytes);
    assert!(listing.contains("control.tar.gz"));
    assert!(listing.contains("data.tar.gz"));
}

#[test]
fn rpm_is_the_default_output_type() {
    let tmp = stage();
    pakr(tmp.path())
        .args(["-n", "tool", "-v", "1.0", "-a", "x86_64", "out/tool=/usr/bin/tool"])
        .assert()
        .success();

    let bytes = fs::read(tmp.path().join("tool-1.0-1.x86_64.rpm")).unwrap();
    assert_eq!(&bytes[..4], &[0xed, 0xab, 0xee, 0xdb]);
}

#[test]
fn package_name_template_substitutes_placeholders() {
    let tmp = stage();
    pakr(tmp.path())
        .args(["-t", "deb", "-n", "tool", "-v", "2.1", "-a", "amd64"])
        .args(["-p", "NAME_VERSION-ITERATION.ARCH.deb", "out/tool=/usr/bin/tool"])
        .assert()
        .success();

    assert!(tmp.path().join("tool_2.1-1.amd64.deb").exists());
}

#[test]
fn target_directory_receives_the_package() {
    let tmp = stage();
    fs::create_dir_all(tmp.path().join("dist")).unwrap();
    pakr(tmp.path())
        .args(["-t", "apk", "-n", "tool", "-v", "1.0", "-a", "x86_64"])
        .args(["--target", "dist", "out/tool=/usr/bin/tool"])
        .assert()
        .success();

    let bytes = fs::read(tmp.path().join("dist/tool-1.0-r1.apk")).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
}

#[test]
fn chdir_searches_files_in_the_given_directory() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("stage/usr/bin")).unwrap();
    fs::write(tmp.path().join("stage/usr/bin/tool"), "x").unwrap();

    pakr(tmp.path())
        .args(["-t", "deb", "-n", "tool", "-v", "1.0", "-a", "amd64"])
        .args(["-C", "stage", "usr/=/usr/"])
        .assert()
        .success();

    assert!(tmp.path().join("tool_1.0-1_amd64.deb").exists());
}

#[test]
fn symlink_mappings_are_packaged() {
    let tmp = stage();
    pakr(tmp.path())
        .args(["-t", "deb", "-n", "tool", "-v", "1.0", "-a", "amd64"])
        .args(["--symlink-files", "/usr/bin/tool=/usr/bin/tool-alias"])
        .args(["out/tool=/usr/bin/tool"])
        .assert()
        .success();

    assert!(tmp.path().join("tool_1.0-1_amd64.deb").exists());
}

#[test]
fn duplicate_destinations_abort_the_build() {
    let tmp = stage();
    pakr(tmp.path())
        .args(["-n", "tool", "-v", "1.0"])
        .args(["out/tool=/usr/bin/x", "conf/tool.conf=/usr/bin/x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate destination: /usr/bin/x"));
}

#[test]
fn empty_file_map_is_rejected() {
    let tmp = TempDir::new().unwrap();
    pakr(tmp.path())
        .args(["-n", "tool", "-v", "1.0", "missing/*"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file map is empty"));
}

#[test]
fn missing_name_fails_validation() {
    let tmp = stage();
    pakr(tmp.path())
        .args(["-v", "1.0", "out/tool=/usr/bin/tool"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("name not set"));
}

#[test]
fn existing_output_needs_force() {
    let tmp = stage();
    let args = ["-t", "deb", "-n", "tool", "-v", "1.0", "-a", "amd64", "out/tool=/usr/bin/tool"];

    pakr(tmp.path()).args(args).assert().success();
    pakr(tmp.path())
        .args(args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    pakr(tmp.path()).args(args).arg("-f").assert().success();
}

#[test]
fn config_file_supplies_the_output_type() {
    let tmp = stage();
    fs::write(tmp.path().join("pakr.toml"), "[defaults]\noutput-type = \"deb\"\n").unwrap();

    pakr(tmp.path())
        .args(["-n", "tool", "-v", "1.0", "-a", "amd64", "out/tool=/usr/bin/tool"])
        .assert()
        .success();

    assert!(tmp.path().join("tool_1.0-1_amd64.deb").exists());
}

#[test]
fn iteration_zero_derives_release_from_version() {
    let tmp = stage();
    pakr(tmp.path())
        .args(["-t", "deb", "-n", "tool", "-v", "1.2.3-4", "-i", "0", "-a", "amd64"])
        .args(["out/tool=/usr/bin/tool"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tool_1.2.3-4_amd64.deb"));
}

#[test]
fn quiet_suppresses_the_success_message() {
    let tmp = stage();
    pakr(tmp.path())
        .args(["-q", "-t", "deb", "-n", "tool", "-v", "1.0", "-a", "amd64"])
        .args(["out/tool=/usr/bin/tool"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn no_arguments_prints_help() {
    Command::cargo_bin("pakr")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
