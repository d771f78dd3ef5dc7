//! Behavioural tests for the `snapctl` binary that stop before any
//! controller is contacted.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn snapctl(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("snapctl");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("SNAPCTL_CONFIG_PATH")
        .env_remove("SNAPCTL_HOST")
        .env_remove("SNAPCTL_USERNAME")
        .env_remove("SNAPCTL_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn temp_home() -> TempDir {
    TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"))
}

#[test]
fn no_command_is_invalid() {
    let home = temp_home();
    snapctl(&home)
        .assert()
        .code(1)
        .stdout("")
        .stderr("Invalid command given.\n");
}

#[test]
fn snaplist_without_volume_prompts_for_it() {
    let home = temp_home();
    snapctl(&home)
        .arg("--snaplist")
        .assert()
        .code(1)
        .stderr("Please specify target volume with --vol\n");
}

#[test]
fn negative_retention_is_rejected() {
    let home = temp_home();
    snapctl(&home)
        .args(["--snaprotate", "--vol", "db01", "--retention", "-3"])
        .assert()
        .code(1)
        .stderr(contains("Invalid --retention").and(contains("-3")));
}

#[test]
fn lunmap_prompts_for_the_lun() {
    let home = temp_home();
    snapctl(&home)
        .args(["--lunmap", "--vol", "db01", "--igroup", "hosts"])
        .assert()
        .code(1)
        .stderr("Please specify name of the LUN with --lun\n");
}

#[test]
fn two_commands_are_a_usage_error() {
    let home = temp_home();
    snapctl(&home)
        .args(["--snaplist", "--snapcreate", "--vol", "db01"])
        .assert()
        .code(1)
        .stderr(contains("cannot be used with"));
}

#[test]
fn missing_controller_address_is_reported() {
    let home = temp_home();
    snapctl(&home)
        .args(["--snaplist", "--vol", "db01", "--user", "vsadmin", "--pass", "pw"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(
            contains("Error:")
                .and(contains("SNAPCTL_HOST"))
                .and(contains("--na")),
        );
}

#[test]
fn help_exits_successfully() {
    let home = temp_home();
    snapctl(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--snaprotate").and(contains("--retention")));
}
