//! Structural diff of tree documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::walk;

/// Maximum recursion depth for diff operations
pub const MAX_DIFF_DEPTH: usize = 128;

/// Differences between two trees, keyed like the trees themselves.
///
/// For a policy/state pair this is `group -> attribute -> value-diff`.
pub type TreeDiff = Map<String, Value>;

/// Kind of difference found at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffOperation {
    /// Present in the desired tree only
    Added,
    /// Present in both with different values
    Changed,
    /// Present in the current tree only
    Removed,
}

impl fmt::Display for DiffOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Changed => write!(f, "changed"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

impl DiffOperation {
    /// Parse a diff operation from its display string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" => Some(Self::Added),
            "changed" => Some(Self::Changed),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Compare tree `a` (desired) against tree `b` (current).
///
/// - keys only in `a` are copied from `a`
/// - keys only in `b` are reported as null, or for mappings as the diff of
///   an empty mapping against them, which enumerates every removed leaf
/// - mappings in both are compared recursively and kept only if non-empty
/// - sequences in both are compared as sets; any difference reports the
///   whole sequence from `a`
/// - anything else is reported from `a` when unequal
///
/// The result is not symmetric: it describes how to make `b` become `a`.
pub fn compare_trees(a: &Map<String, Value>, b: &Map<String, Value>) -> TreeDiff {
    compare_with_depth(a, b, 0)
}

fn compare_with_depth(a: &Map<String, Value>, b: &Map<String, Value>, depth: usize) -> TreeDiff {
    let mut result = Map::new();

    for (key, a_value) in a {
        let Some(b_value) = b.get(key) else {
            result.insert(key.clone(), a_value.clone());
            continue;
        };

        match (a_value, b_value) {
            (Value::Object(a_map), Value::Object(b_map)) if depth < MAX_DIFF_DEPTH => {
                let nested = compare_with_depth(a_map, b_map, depth + 1);
                if !nested.is_empty() {
                    result.insert(key.clone(), Value::Object(nested));
                }
            }
            (Value::Array(a_items), Value::Array(b_items)) => {
                if !same_elements(a_items, b_items) {
                    result.insert(key.clone(), a_value.clone());
                }
            }
            _ => {
                if a_value != b_value {
                    result.insert(key.clone(), a_value.clone());
                }
            }
        }
    }

    for (key, b_value) in b {
        if a.contains_key(key) {
            continue;
        }
        let reported = match b_value {
            Value::Object(b_map) if depth < MAX_DIFF_DEPTH => {
                Value::Object(compare_with_depth(&Map::new(), b_map, depth + 1))
            }
            _ => Value::Null,
        };
        result.insert(key.clone(), reported);
    }

    result
}

/// Set comparison of two sequences: order and duplicates are ignored.
fn same_elements(a: &[Value], b: &[Value]) -> bool {
    a.iter().all(|item| b.contains(item)) && b.iter().all(|item| a.contains(item))
}

/// Classify the difference at `path` between desired tree `a` and current tree `b`.
///
/// Absent in `a` is REMOVED, absent in `b` is ADDED, otherwise CHANGED.
pub fn diff_operation<S: AsRef<str>>(
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    path: &[S],
) -> DiffOperation {
    if walk(a, path).is_none() {
        DiffOperation::Removed
    } else if walk(b, path).is_none() {
        DiffOperation::Added
    } else {
        DiffOperation::Changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a mapping"),
        }
    }

    #[test]
    fn key_only_in_a_is_copied() {
        let diff = compare_trees(&map(json!({"g": {"x": 1}})), &map(json!({})));
        assert_eq!(Value::Object(diff), json!({"g": {"x": 1}}));
    }

    #[test]
    fn scalar_only_in_b_is_null() {
        let diff = compare_trees(&map(json!({"g": {}})), &map(json!({"g": {"x": 1}})));
        assert_eq!(Value::Object(diff), json!({"g": {"x": null}}));
    }

    #[test]
    fn mapping_only_in_b_enumerates_removed_leaves() {
        let diff = compare_trees(
            &map(json!({})),
            &map(json!({"g": {"x": 1, "y": {"z": [1]}}})),
        );
        assert_eq!(Value::Object(diff), json!({"g": {"x": null, "y": {"z": null}}}));
    }

    #[test]
    fn equal_nested_mappings_are_omitted() {
        let tree = map(json!({"g": {"x": {"y": 1}}}));
        assert!(compare_trees(&tree, &tree).is_empty());
    }

    #[test]
    fn list_reordering_is_not_a_change() {
        let diff = compare_trees(
            &map(json!({"g": {"members": ["a", "b"]}})),
            &map(json!({"g": {"members": ["b", "a", "a"]}})),
        );
        assert!(diff.is_empty());
    }

    #[test]
    fn list_element_change_reports_whole_list() {
        let diff = compare_trees(
            &map(json!({"g": {"members": ["a", "b", "c"]}})),
            &map(json!({"g": {"members": ["a", "b"]}})),
        );
        assert_eq!(Value::Object(diff), json!({"g": {"members": ["a", "b", "c"]}}));
    }

    #[test]
    fn type_change_is_reported() {
        let diff = compare_trees(&map(json!({"x": "1"})), &map(json!({"x": 1})));
        assert_eq!(Value::Object(diff), json!({"x": "1"}));
    }

    #[test]
    fn diff_operation_classification() {
        let a = map(json!({"g": {"new": 1, "both": 2}}));
        let b = map(json!({"g": {"old": 1, "both": 3}}));
        assert_eq!(diff_operation(&a, &b, &["g", "new"]), DiffOperation::Added);
        assert_eq!(diff_operation(&a, &b, &["g", "old"]), DiffOperation::Removed);
        assert_eq!(diff_operation(&a, &b, &["g", "both"]), DiffOperation::Changed);
    }

    #[test]
    fn diff_operation_round_trips_through_display() {
        for op in [DiffOperation::Added, DiffOperation::Changed, DiffOperation::Removed] {
            assert_eq!(DiffOperation::parse(&op.to_string()), Some(op));
        }
    }
}
