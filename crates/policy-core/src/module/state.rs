//! The built-in state-tracking module
//!
//! Every changeset produced from a policy difference ends with a
//! `state:set_state` change. Performing it copies the reconciled value into
//! the state document paired with the policy, or deletes the leaf when the
//! attribute was removed. This module is also the fallback handler for
//! attributes no other module claims.

use super::{Module, SET_STATE_OPERATION, STATE_MODULE};
use crate::change::{Change, ChangeState};
use crate::error::ExecutionError;
use crate::policy::{PolicySet, PolicyView};
use crate::tree::DiffOperation;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// State documents shared between the engine and the worker.
pub type SharedStates = Arc<Mutex<PolicySet>>;

enum StateOperation {
    SetState,
}

impl StateOperation {
    fn parse(operation: &str) -> Option<Self> {
        match operation {
            SET_STATE_OPERATION => Some(Self::SetState),
            _ => None,
        }
    }
}

/// Records reconciled values into the state documents.
pub struct StateModule {
    states: SharedStates,
}

impl StateModule {
    pub fn new(states: SharedStates) -> Self {
        Self { states }
    }

    fn set_state(&self, change: &Change) -> Result<ChangeState, ExecutionError> {
        let policy = change
            .param_str("policy")
            .ok_or_else(|| ExecutionError::invalid_parameter("policy", "expected a string"))?;
        let path: Vec<&str> = change
            .param("path")
            .and_then(Value::as_array)
            .map(|segments| segments.iter().filter_map(Value::as_str).collect())
            .ok_or_else(|| ExecutionError::invalid_parameter("path", "expected a list"))?;
        let operation = change
            .param_str("diff_type")
            .and_then(DiffOperation::parse)
            .ok_or_else(|| ExecutionError::invalid_parameter("diff_type", "expected added, changed or removed"))?;

        let mut states = self.states.lock();
        let state = states
            .get_mut(policy)
            .ok_or_else(|| ExecutionError::UnknownPolicy(policy.to_string()))?;

        match operation {
            DiffOperation::Added | DiffOperation::Changed => {
                let value = change.param("value").cloned().unwrap_or(Value::Null);
                state.set(&path, value);
            }
            DiffOperation::Removed => {
                state.set(&path, Value::Null);
                prune_empty_parents(state, &path);
            }
        }
        tracing::debug!(policy, path = ?path, %operation, "Recorded state");
        Ok(ChangeState::Completed)
    }
}

/// Drop mappings left empty by a removal so a deleted group disappears
/// from the state document entirely.
fn prune_empty_parents(state: &mut PolicyView, path: &[&str]) {
    for depth in (1..path.len()).rev() {
        let parent = &path[..depth];
        let empty = matches!(state.tree().get(parent), Some(Value::Object(map)) if map.is_empty());
        if !empty {
            break;
        }
        state.set(parent, Value::Null);
    }
}

impl Module for StateModule {
    fn name(&self) -> &str {
        STATE_MODULE
    }

    fn perform_change(&mut self, change: &Change) -> Result<ChangeState, ExecutionError> {
        match StateOperation::parse(&change.operation) {
            Some(StateOperation::SetState) => self.set_state(change),
            None => Ok(ChangeState::NotHandled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn states() -> SharedStates {
        let mut set = PolicySet::new();
        set.insert(
            "groups".to_string(),
            PolicyView::from_value("groups", json!({"www": {"shell": "/bin/sh"}}), false),
        );
        Arc::new(Mutex::new(set))
    }

    fn set_state(params: Value) -> Change {
        Change::with_params(STATE_MODULE, SET_STATE_OPERATION, params)
    }

    #[test]
    fn added_value_is_written() {
        let shared = states();
        let mut module = StateModule::new(shared.clone());
        let change = set_state(json!({
            "policy": "groups", "path": ["www", "basedir"], "value": "/srv", "diff_type": "added"
        }));

        assert_eq!(module.perform_change(&change).unwrap(), ChangeState::Completed);
        assert_eq!(shared.lock()["groups"].get(&["www", "basedir"]), Some(json!("/srv")));
    }

    #[test]
    fn removed_value_deletes_leaf() {
        let shared = states();
        let mut module = StateModule::new(shared.clone());
        let change = set_state(json!({
            "policy": "groups", "path": ["www", "shell"], "value": null, "diff_type": "removed"
        }));

        assert_eq!(module.perform_change(&change).unwrap(), ChangeState::Completed);
        assert_eq!(shared.lock()["groups"].get(&["www", "shell"]), None);
        assert!(!shared.lock()["groups"].contains_section("www"));
    }

    #[test]
    fn unknown_policy_is_an_error() {
        let mut module = StateModule::new(states());
        let change = set_state(json!({
            "policy": "services", "path": ["ssh", "x"], "value": 1, "diff_type": "added"
        }));

        assert!(matches!(
            module.perform_change(&change),
            Err(ExecutionError::UnknownPolicy(name)) if name == "services"
        ));
    }

    #[test]
    fn unknown_operation_is_not_handled() {
        let mut module = StateModule::new(states());
        let change = Change::with_params(STATE_MODULE, "rollback", json!({}));
        assert_eq!(module.perform_change(&change).unwrap(), ChangeState::NotHandled);
    }
}
