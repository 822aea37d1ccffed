use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn scan_quiet_suppresses_non_essential_output() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("res/layout")).unwrap();
    fs::write(root.join("res/layout/main.xml"), "<merge/>").unwrap();

    let mut cmd_no_quiet = Command::cargo_bin("layout-includes").unwrap();
    cmd_no_quiet.arg("scan").arg("--path").arg(root);
    cmd_no_quiet.assert().success().stdout(predicate::str::contains("Scanned 1 layouts"));

    let mut cmd_quiet = Command::cargo_bin("layout-includes").unwrap();
    cmd_quiet.arg("-q").arg("scan").arg("--path").arg(root);
    cmd_quiet.assert().success().stdout(predicate::str::contains("Scanned").not());
}
