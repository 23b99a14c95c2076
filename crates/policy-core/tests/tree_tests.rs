//! Tests for tree documents backed by files

use policy_core::{PolicyView, TreeStore};
use policy_fs::NormalizedPath;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;
use tempfile::tempdir;

#[rstest]
#[case("groups.yaml")]
#[case("groups.json")]
#[case("groups.toml")]
fn save_then_load_reproduces_document(#[case] file: &str) {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join(file));

    let mut tree = TreeStore::new("groups", Some(path.clone()));
    tree.set(&["www", "basedir"], json!("/srv"));
    tree.set(&["www", "usergroups"], json!(["web", "staff"]));
    tree.set(&["_default_", "uid_min"], json!(1000));
    tree.save().unwrap();

    let loaded = TreeStore::open("groups", path).unwrap();
    assert_eq!(loaded.data(), tree.data());
    assert!(loaded.compare_to(&tree).is_empty());
}

#[test]
fn save_creates_parent_directories() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("state/nested/groups.yaml"));

    let mut tree = TreeStore::new("groups", Some(path.clone()));
    tree.set(&["a", "b"], json!(1));
    tree.save().unwrap();

    assert!(path.is_file());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("absent.yaml"));

    let err = TreeStore::open("groups", path).unwrap_err();
    assert!(err.is_io(), "expected an I/O error, got {err}");
}

#[test]
fn malformed_file_is_not_an_io_error() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("broken.yaml");
    std::fs::write(&file, "www: [unclosed\n").unwrap();

    let err = TreeStore::open("groups", NormalizedPath::new(&file)).unwrap_err();
    assert!(!err.is_io());
}

#[test]
fn empty_file_loads_as_empty_mapping() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("empty.yaml");
    std::fs::write(&file, "").unwrap();

    let tree = TreeStore::open("groups", NormalizedPath::new(&file)).unwrap();
    assert!(tree.data().is_empty());
}

#[test]
fn policy_file_merges_defaults_on_open() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("groups.yaml");
    std::fs::write(
        &file,
        "_default_:\n  shell: /bin/bash\n  basedir: /home\nwww:\n  basedir: /srv\n",
    )
    .unwrap();

    let policy = PolicyView::open("groups", NormalizedPath::new(&file), true).unwrap();
    assert_eq!(
        policy.tree().get(&["www", "shell"]),
        Some(&json!("/bin/bash"))
    );
    assert_eq!(policy.get(&["www", "basedir"]), Some(json!("/srv")));
}

#[test]
fn compare_reports_what_state_lacks() {
    let policy = TreeStore::from_value(
        "groups",
        json!({"www": {"basedir": "/srv", "shell": "/bin/sh"}, "dev": {"shell": "/bin/zsh"}}),
    );
    let state = TreeStore::from_value(
        "groups",
        json!({"www": {"basedir": "/srv"}, "old": {"shell": "/bin/sh"}}),
    );

    let diff = policy.compare_to(&state);
    assert_eq!(
        serde_json::Value::Object(diff),
        json!({
            "www": {"shell": "/bin/sh"},
            "dev": {"shell": "/bin/zsh"},
            "old": {"shell": null}
        })
    );
}
