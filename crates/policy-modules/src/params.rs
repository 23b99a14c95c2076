//! Typed access to change parameters

use crate::error::{Error, Result};
use policy_core::Change;
use serde_json::Value;

/// A required string parameter.
pub(crate) fn required_str<'a>(change: &'a Change, name: &str) -> Result<&'a str> {
    change
        .param_str(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::invalid_parameter(name, "expected a non-empty string"))
}

/// An optional scalar parameter rendered as a command-line argument.
pub(crate) fn optional_arg(change: &Change, name: &str) -> Option<String> {
    change.param(name).and_then(scalar_arg)
}

/// A boolean parameter, `default` when absent.
pub(crate) fn flag(change: &Change, name: &str, default: bool) -> bool {
    change.param(name).and_then(Value::as_bool).unwrap_or(default)
}

/// A list of strings; a single string counts as a one-element list.
pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_arg).collect(),
        Some(other) => scalar_arg(other).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Strings, numbers and booleans as plain text; anything else is `None`.
pub(crate) fn scalar_arg(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_accept_single_values() {
        assert_eq!(string_list(Some(&json!("web"))), vec!["web"]);
        assert_eq!(string_list(Some(&json!(["web", 5]))), vec!["web", "5"]);
        assert!(string_list(Some(&json!(null))).is_empty());
        assert!(string_list(None).is_empty());
    }

    #[test]
    fn required_rejects_empty_strings() {
        let change = Change::with_params("m", "op", json!({"name": ""}));
        assert!(required_str(&change, "name").is_err());
        assert!(required_str(&change, "other").is_err());
    }
}
