//! The module contract
//!
//! A module claims `(policy type, attribute)` pairs and event categories.
//! For a claimed attribute it turns a difference between policy and state
//! into a [`ChangeSet`], and later performs each [`Change`] whose
//! `subsystem` is its name.
//!
//! Diff dispatch is a closed match over [`DiffOperation`] in
//! [`check_diff`]; modules only override the capability methods they need.

mod event;
pub mod state;

pub use event::EventCategory;
pub use state::{SharedStates, StateModule};

use crate::change::{Change, ChangeSet, ChangeState};
use crate::error::ExecutionError;
use crate::policy::{DEFAULT_SECTION, PolicySet};
use crate::tree::DiffOperation;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Name of the built-in state-tracking module
pub const STATE_MODULE: &str = "state";

/// Operation recording a reconciled value in the state document
pub const SET_STATE_OPERATION: &str = "set_state";

/// Attributes claimed by a module, keyed by policy type.
pub type HandledAttributes = BTreeMap<String, Vec<String>>;

/// One `[group, attribute]` difference handed to a module.
#[derive(Debug, Clone, Copy)]
pub struct AttributeDiff<'a> {
    /// Policy type the difference was found in
    pub policy: &'a str,
    pub group: &'a str,
    pub attribute: &'a str,
    /// Desired value; `None` when the attribute was removed
    pub value: Option<&'a Value>,
    /// The raw diff entry for this attribute
    pub detail: &'a Value,
    pub operation: DiffOperation,
}

/// A difference reported by the engine for one policy path.
#[derive(Debug, Clone, Copy)]
pub struct DiffRequest<'a> {
    pub policy: &'a str,
    pub operation: DiffOperation,
    pub path: &'a [String],
    pub value: Option<&'a Value>,
    pub detail: &'a Value,
}

/// A pluggable handler for policy attributes and events.
///
/// Only [`Module::name`] and [`Module::perform_change`] are mandatory.
pub trait Module: Send {
    /// Unique registry key, also the `subsystem` of the changes it performs.
    fn name(&self) -> &str;

    /// The `(policy type, attribute)` pairs this module handles.
    fn handled_attributes(&self) -> HandledAttributes {
        HandledAttributes::new()
    }

    /// Event categories routed to [`Module::handle_event`].
    fn event_hooks(&self) -> Vec<EventCategory> {
        Vec::new()
    }

    /// React to an event by extending `changeset`.
    fn handle_event(
        &mut self,
        _event: EventCategory,
        _changeset: &mut ChangeSet,
        _policies: &PolicySet,
    ) -> Result<(), ExecutionError> {
        Ok(())
    }

    /// A value of the default section changed.
    fn set_default(&mut self, _diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        None
    }

    /// An attribute appeared in a group.
    fn new_attribute(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        self.set_attribute(diff)
    }

    /// An attribute of a group changed.
    fn set_attribute(&mut self, _diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        None
    }

    /// An attribute disappeared from a group.
    fn remove_attribute(&mut self, _diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        None
    }

    /// Execute one change.
    ///
    /// Operations the module does not recognize return
    /// [`ChangeState::NotHandled`], never an error.
    fn perform_change(&mut self, change: &Change) -> Result<ChangeState, ExecutionError>;
}

/// Translate one difference into a changeset.
///
/// The handler is chosen by the path: the default section goes to
/// [`Module::set_default`], other groups by diff operation. Whatever the
/// handler returns, a trailing `state:set_state` change recording the
/// reconciled value is appended.
pub fn check_diff(module: &mut dyn Module, request: &DiffRequest<'_>) -> ChangeSet {
    let produced = match request.path {
        [group, attribute, ..] => {
            let diff = AttributeDiff {
                policy: request.policy,
                group,
                attribute,
                value: request.value,
                detail: request.detail,
                operation: request.operation,
            };
            tracing::debug!(
                module = module.name(),
                policy = request.policy,
                group = group.as_str(),
                attribute = attribute.as_str(),
                operation = %request.operation,
                "Dispatching attribute difference"
            );
            if group == DEFAULT_SECTION {
                module.set_default(&diff)
            } else {
                match request.operation {
                    DiffOperation::Added => module.new_attribute(&diff),
                    DiffOperation::Changed => module.set_attribute(&diff),
                    DiffOperation::Removed => module.remove_attribute(&diff),
                }
            }
        }
        _ => None,
    };

    let mut changeset = produced.unwrap_or_default();
    changeset.append(state_change(request));
    changeset
}

/// The change persisting a reconciled value into the state document.
pub fn state_change(request: &DiffRequest<'_>) -> Change {
    Change::with_params(
        STATE_MODULE,
        SET_STATE_OPERATION,
        json!({
            "policy": request.policy,
            "path": request.path,
            "value": request.value.cloned().unwrap_or(Value::Null),
            "diff_type": request.operation,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Module for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn set_default(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
            self.calls.push(format!("default:{}", diff.attribute));
            None
        }

        fn set_attribute(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
            self.calls.push(format!("set:{}:{}", diff.group, diff.attribute));
            Some(ChangeSet::from(Change::with_params(
                "recorder",
                "apply",
                json!({"value": diff.value}),
            )))
        }

        fn remove_attribute(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
            self.calls.push(format!("remove:{}", diff.attribute));
            None
        }

        fn perform_change(&mut self, _change: &Change) -> Result<ChangeState, ExecutionError> {
            Ok(ChangeState::Completed)
        }
    }

    fn request<'a>(
        path: &'a [String],
        operation: DiffOperation,
        value: Option<&'a Value>,
    ) -> DiffRequest<'a> {
        DiffRequest {
            policy: "groups",
            operation,
            path,
            value,
            detail: &Value::Null,
        }
    }

    #[test]
    fn added_defaults_to_set_attribute() {
        let mut module = Recorder::default();
        let path = vec!["www".to_string(), "shell".to_string()];
        let value = json!("/bin/sh");
        let cs = check_diff(&mut module, &request(&path, DiffOperation::Added, Some(&value)));

        assert_eq!(module.calls, vec!["set:www:shell"]);
        assert_eq!(cs.summary(), "recorder:apply, state:set_state");
        let last = &cs.changes()[1];
        assert_eq!(last.param("value"), Some(&value));
        assert_eq!(last.param_str("diff_type"), Some("added"));
        assert_eq!(last.param("path"), Some(&json!(["www", "shell"])));
    }

    #[test]
    fn default_section_routes_to_set_default() {
        let mut module = Recorder::default();
        let path = vec![DEFAULT_SECTION.to_string(), "shell".to_string()];
        let cs = check_diff(&mut module, &request(&path, DiffOperation::Changed, None));

        assert_eq!(module.calls, vec!["default:shell"]);
        assert_eq!(cs.summary(), "state:set_state");
    }

    #[test]
    fn removed_records_null_value() {
        let mut module = Recorder::default();
        let path = vec!["www".to_string(), "shell".to_string()];
        let cs = check_diff(&mut module, &request(&path, DiffOperation::Removed, None));

        assert_eq!(module.calls, vec!["remove:shell"]);
        assert_eq!(cs.changes()[0].param("value"), Some(&Value::Null));
        assert_eq!(cs.changes()[0].param_str("diff_type"), Some("removed"));
    }

    #[test]
    fn short_path_only_records_state() {
        let mut module = Recorder::default();
        let path = vec!["www".to_string()];
        let cs = check_diff(&mut module, &request(&path, DiffOperation::Added, None));

        assert!(module.calls.is_empty());
        assert_eq!(cs.len(), 1);
    }
}
