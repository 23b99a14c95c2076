//! Integration tests for fragment placement and replacement.

use policy_blocks::{
    FragmentTag, Placement, find_fragment, parse_fragments, remove_fragment,
    remove_fragment_from_file, upsert_fragment, upsert_fragment_in_file,
};
use policy_fs::NormalizedPath;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const PAM_STACK: &str = "auth required pam_unix.so\naccount required pam_unix.so\nsession required pam_unix.so\n";

fn body(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}

#[test]
fn test_insert_before_first_matching_line() {
    let tag = FragmentTag::new("pam", "groups_allow");
    let placement = Placement::before("^account").unwrap();

    let result = upsert_fragment(PAM_STACK, &tag, &body(&["account required x.so"]), &placement);

    let lines: Vec<&str> = result.lines().collect();
    assert_eq!(lines[0], "auth required pam_unix.so");
    assert_eq!(lines[1], "### BEGIN policy module pam -- groups_allow ###");
    assert_eq!(lines[2], "account required x.so");
    assert_eq!(lines[3], "### END policy module pam -- groups_allow ###");
    assert_eq!(lines[4], "account required pam_unix.so");
}

#[test]
fn test_insert_after_first_matching_line() {
    let tag = FragmentTag::new("pam", "users_deny");
    let placement = Placement::after("^auth").unwrap();

    let result = upsert_fragment(PAM_STACK, &tag, &body(&["rule"]), &placement);

    let lines: Vec<&str> = result.lines().collect();
    assert_eq!(lines[0], "auth required pam_unix.so");
    assert_eq!(lines[1], "### BEGIN policy module pam -- users_deny ###");
}

#[test]
fn test_unmatched_pattern_appends() {
    let tag = FragmentTag::new("pam", "x");
    let placement = Placement::before("^password").unwrap();

    let result = upsert_fragment(PAM_STACK, &tag, &body(&["rule"]), &placement);

    assert!(result.starts_with(PAM_STACK));
    assert!(result.ends_with("### END policy module pam -- x ###\n"));
}

#[test]
fn test_reapplying_is_idempotent() {
    let tag = FragmentTag::new("pam", "groups_allow");
    let placement = Placement::before("^account").unwrap();
    let rule = body(&["account required pam_succeed_if.so quiet user ingroup admins"]);

    let once = upsert_fragment(PAM_STACK, &tag, &rule, &placement);
    let twice = upsert_fragment(&once, &tag, &rule, &placement);

    assert_eq!(once, twice);
}

#[test]
fn test_fragments_with_distinct_tags_coexist() {
    let allow = FragmentTag::new("pam", "groups_allow");
    let deny = FragmentTag::new("pam", "groups_deny");

    let content = upsert_fragment(PAM_STACK, &allow, &body(&["allow"]), &Placement::Append);
    let content = upsert_fragment(&content, &deny, &body(&["deny"]), &Placement::Append);

    assert_eq!(parse_fragments(&content).len(), 2);
    assert_eq!(find_fragment(&content, &allow).unwrap().content, "allow");
}

#[test]
fn test_remove_restores_original() {
    let tag = FragmentTag::new("pam", "groups_allow");
    let placement = Placement::before("^account").unwrap();

    let with_fragment = upsert_fragment(PAM_STACK, &tag, &body(&["rule"]), &placement);
    let restored = remove_fragment(&with_fragment, &tag).unwrap();

    assert_eq!(restored, PAM_STACK);
}

#[test]
fn test_invalid_pattern_is_error() {
    assert!(Placement::before("(unclosed").is_err());
}

#[test]
fn test_file_upsert_creates_and_reports_changes() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("pam.d/sshd"));
    let tag = FragmentTag::new("pam", "users_allow");

    assert!(upsert_fragment_in_file(&path, &tag, &body(&["rule"]), &Placement::Append).unwrap());
    assert!(!upsert_fragment_in_file(&path, &tag, &body(&["rule"]), &Placement::Append).unwrap());

    let content = fs::read_to_string(path.to_native()).unwrap();
    assert!(content.contains("rule"));
}

#[test]
fn test_file_remove_is_tolerant() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("sshd"));
    let tag = FragmentTag::new("pam", "users_allow");

    assert!(!remove_fragment_from_file(&path, &tag).unwrap());

    fs::write(path.to_native(), PAM_STACK).unwrap();
    upsert_fragment_in_file(&path, &tag, &body(&["rule"]), &Placement::Append).unwrap();
    assert!(remove_fragment_from_file(&path, &tag).unwrap());
    assert_eq!(fs::read_to_string(path.to_native()).unwrap(), PAM_STACK);
}
