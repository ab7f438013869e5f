// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests of the `dep` binary. These only exercise failures that
//! happen before anything is staged; the stages themselves are tested inside
//! the crate against fake services.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

use std::path::Path;
use std::process::Output;
use std::str::from_utf8;

use assert_cmd::{output::OutputError, Command};
use indoc::formatdoc;
use tempfile::TempDir;

fn dep() -> Command {
    Command::cargo_bin("dep").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

fn write_config(dir: &Path, rootdir: &Path) -> std::path::PathBuf {
    let config = dir.join("config.live.ini");
    std::fs::write(
        &config,
        formatdoc! {r#"
            HIRES:
              ROOTDIR: {root}
            REPORT:
              ADMINEMAIL: koaadmin@example.com
        "#, root = rootdir.display()},
    )
    .unwrap();
    config
}

#[test]
fn test_help() {
    let (stdout, _) = get_cmd_output(dep().arg("--help").ok());
    assert!(stdout.contains("PROCESS_START"), "{stdout}");
    assert!(stdout.contains("--no-progress-bars"), "{stdout}");
}

#[test]
fn test_unknown_instrument() {
    let result = dep().args(["hirez", "2017-07-07"]).ok();
    assert!(result.is_err());
    let (_, stderr) = get_cmd_output(result);
    assert!(stderr.contains("'hirez' is not a supported instrument"), "{stderr}");
    assert!(stderr.contains("Usage: dep"), "{stderr}");
}

#[test]
fn test_bad_stage() {
    let result = dep().args(["hires", "2017-07-07", "1", "ingest"]).ok();
    assert!(result.is_err());
    let (_, stderr) = get_cmd_output(result);
    assert!(stderr.contains("'ingest' is not a stage"), "{stderr}");
}

#[test]
fn test_missing_config() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("nothing_here.ini");
    let result = dep()
        .args(["hires", "2017-07-07", "0", "--no-progress-bars", "-c"])
        .arg(&config)
        .ok();
    assert!(result.is_err());
    let (_, stderr) = get_cmd_output(result);
    assert!(stderr.contains("Couldn't read config file"), "{stderr}");
    assert!(stderr.contains("Check the configuration file"), "{stderr}");
}

#[test]
fn test_instrument_without_section() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), tmp.path());
    let result = dep()
        .args(["nirc2", "2017-07-07", "0", "--no-progress-bars", "-c"])
        .arg(&config)
        .ok();
    assert!(result.is_err());
    let (_, stderr) = get_cmd_output(result);
    assert!(
        stderr.contains("no section for instrument NIRC2"),
        "{stderr}"
    );
}

#[test]
fn test_missing_rootdir() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &tmp.path().join("not_a_dir"));
    let result = dep()
        .args(["hires", "2017-07-07", "0", "--no-progress-bars", "-c"])
        .arg(&config)
        .ok();
    assert!(result.is_err());
    let (_, stderr) = get_cmd_output(result);
    assert!(stderr.contains("doesn't exist"), "{stderr}");
}
