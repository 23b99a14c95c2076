//! End-to-end runs of the `policy` binary

use assert_cmd::Command;
use policy_test_utils::TestPolicyDir;
use predicates::prelude::*;

const MOTD: &str = "_default_:\n  banner: welcome\nlab:\n  banner: hands off\n";

fn policy() -> Command {
    let mut cmd = Command::cargo_bin("policy").unwrap();
    cmd.env_remove("POLICY_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_run_modes() {
    policy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--update"))
        .stdout(predicate::str::contains("--deploy"))
        .stdout(predicate::str::contains("--add-user"));
}

#[test]
fn run_mode_is_required() {
    policy()
        .arg("--pretend")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn run_modes_are_exclusive() {
    policy()
        .args(["--update", "--deploy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_configuration_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    policy()
        .args(["-u", "-P", "-c"])
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("Configuration not found"));
}

#[test]
fn pretend_update_shows_changesets_without_applying() {
    let dir = TestPolicyDir::new().with_policy("motd", MOTD);
    let config = dir.write_config();

    policy()
        .args(["--update", "--pretend", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("subsystem: state"))
        .stdout(predicate::str::contains("hands off"))
        .stdout(predicate::str::contains("nothing was applied"));

    assert!(!dir.read("state/motd.yaml").contains("banner"));
}

#[test]
fn update_with_yes_records_state() {
    let dir = TestPolicyDir::new().with_policy("motd", MOTD);
    let config = dir.write_config();

    policy()
        .args(["-u", "-y", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));

    dir.assert_file_contains("state/motd.yaml", "hands off");

    // A second run finds nothing left to reconcile
    policy()
        .args(["-u", "-y", "-c"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to do"));
}

#[test]
fn config_from_environment() {
    let dir = TestPolicyDir::new().with_policy("motd", MOTD);
    let config = dir.write_config();

    policy()
        .env("POLICY_CONFIG", &config)
        .args(["--deploy", "--pretend"])
        .assert()
        .success()
        .stdout(predicate::str::contains("welcome"));
}
