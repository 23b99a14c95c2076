//! Tests for main configuration loading and engine start-up

use policy_core::{ChangeState, Engine, Error, MainConfig, ModuleRegistry};
use policy_fs::NormalizedPath;
use policy_test_utils::TestPolicyDir;
use rstest::rstest;
use serde_json::json;
use tempfile::tempdir;

#[rstest]
#[case("policy: {}\n", "general")]
#[case("general:\n  state-path: s\npolicy: {}\n", "general.policy-path")]
#[case("general:\n  policy-path: p\npolicy: {}\n", "general.state-path")]
#[case("general:\n  policy-path: p\n  state-path: s\n", "policy")]
fn missing_required_key_is_reported(#[case] yaml: &str, #[case] missing: &str) {
    let dir = tempdir().unwrap();
    let file = dir.path().join("main.yaml");
    std::fs::write(&file, yaml).unwrap();

    let err = MainConfig::load(&NormalizedPath::new(&file)).unwrap_err();
    match err {
        Error::MissingConfigKey { key } => assert_eq!(key, missing),
        other => panic!("expected a missing key error, got {other}"),
    }
}

#[test]
fn missing_config_file_is_not_found() {
    let dir = tempdir().unwrap();
    let err = MainConfig::load(&NormalizedPath::new(dir.path().join("main.yaml"))).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { .. }));
}

#[test]
fn explicit_location_wins() {
    let located = MainConfig::locate(Some(std::path::Path::new("/tmp/custom.yaml"))).unwrap();
    assert_eq!(located.as_str(), "/tmp/custom.yaml");
}

#[test]
fn open_creates_missing_state_documents() {
    let dir = TestPolicyDir::new().with_policy("groups", "www:\n  basedir: /srv\n");
    let config = MainConfig::load(&NormalizedPath::new(dir.write_config())).unwrap();

    let engine = Engine::open(&config, ModuleRegistry::new()).unwrap();

    dir.assert_file_exists("state/groups.yaml");
    assert!(engine.state("groups").unwrap().data().is_empty());
    assert_eq!(engine.policy_diff()["groups"].len(), 1);
}

#[test]
fn malformed_state_document_is_fatal() {
    let dir = TestPolicyDir::new()
        .with_policy("groups", "www:\n  basedir: /srv\n")
        .with_state("groups", "www: [unclosed\n");
    let config = MainConfig::load(&NormalizedPath::new(dir.write_config())).unwrap();

    let err = Engine::open(&config, ModuleRegistry::new()).unwrap_err();
    assert!(!err.is_io());
}

#[test]
fn missing_policy_document_is_fatal() {
    let dir = TestPolicyDir::new().with_policy("groups", "{}\n");
    std::fs::remove_file(dir.root().join("policy/groups.yaml")).unwrap();
    let config = MainConfig::load(&NormalizedPath::new(dir.write_config())).unwrap();

    assert!(Engine::open(&config, ModuleRegistry::new()).is_err());
}

#[test]
fn applied_state_survives_a_restart() {
    let dir = TestPolicyDir::new()
        .with_policy(
            "groups",
            "_default_:\n  shell: /bin/bash\nwww:\n  basedir: /srv\n  usergroups: [web, staff]\n",
        )
        .with_state("groups", "{}\n");
    let config = MainConfig::load(&NormalizedPath::new(dir.write_config())).unwrap();

    {
        let engine = Engine::open(&config, ModuleRegistry::new()).unwrap();
        engine.get_policy_updates().unwrap();
        engine.accept_state_changes();
        engine
            .enqueue_changesets(engine.changesets_with_state(ChangeState::Accepted))
            .unwrap();
        engine.wait_idle();
        engine.save_state().unwrap();
    }

    dir.assert_file_contains("state/groups.yaml", "basedir: /srv");
    let engine = Engine::open(&config, ModuleRegistry::new()).unwrap();
    assert!(engine.policy_diff()["groups"].is_empty());
    assert!(engine.get_policy_updates().unwrap().is_empty());
    assert_eq!(
        engine.state("groups").unwrap().get(&["www", "usergroups"]),
        Some(json!(["web", "staff"]))
    );
}
