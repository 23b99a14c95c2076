//! Changes, ChangeSets and their lifecycle
//!
//! A [`Change`] is one remediation action bound to a module (its
//! `subsystem`) and an operation. A [`ChangeSet`] is an ordered bundle of
//! changes accepted or rejected as a whole: changes frequently depend on
//! the ones before them, so partial acceptance is not offered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a change or changeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChangeState {
    /// Initial, never externally observed
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "proposed")]
    Proposed,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "ignored")]
    Ignored,
    /// No handler claimed the operation; a benign terminal state
    #[serde(rename = "not handled")]
    NotHandled,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl ChangeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Proposed => "proposed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Ignored => "ignored",
            Self::NotHandled => "not handled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Counts as success when deriving a changeset's outcome.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::NotHandled)
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Ignored | Self::NotHandled | Self::Completed | Self::Failed
        )
    }
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named parameters of a change
pub type Parameters = Map<String, Value>;

/// One atomic remediation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Name of the module that performs this change
    pub subsystem: String,
    /// Operation understood by that module
    pub operation: String,
    pub parameters: Parameters,
    pub state: ChangeState,
}

impl Change {
    /// Create a proposed change.
    pub fn new(subsystem: impl Into<String>, operation: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            subsystem: subsystem.into(),
            operation: operation.into(),
            parameters,
            state: ChangeState::Proposed,
        }
    }

    /// Create a proposed change from a JSON object literal.
    ///
    /// A non-object `parameters` value yields empty parameters.
    pub fn with_params(subsystem: impl Into<String>, operation: impl Into<String>, parameters: Value) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(subsystem, operation, parameters)
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    /// `subsystem:operation`
    pub fn describe(&self) -> String {
        format!("{}:{}", self.subsystem, self.operation)
    }

    /// Same action regardless of lifecycle state.
    pub fn same_action(&self, other: &Change) -> bool {
        self.subsystem == other.subsystem
            && self.operation == other.operation
            && self.parameters == other.parameters
    }
}

/// An ordered, all-or-nothing bundle of changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub id: Uuid,
    pub proposed_at: DateTime<Utc>,
    state: ChangeState,
    changes: Vec<Change>,
}

impl Default for ChangeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSet {
    /// An empty proposed changeset.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            proposed_at: Utc::now(),
            state: ChangeState::Proposed,
            changes: Vec::new(),
        }
    }

    pub fn from_changes(changes: impl IntoIterator<Item = Change>) -> Self {
        let mut changeset = Self::new();
        changeset.extend(changes);
        changeset
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Mutable access to individual changes; the sequence length is fixed.
    pub fn changes_mut(&mut self) -> &mut [Change] {
        &mut self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The recorded state, without re-deriving it from the changes.
    pub fn state(&self) -> ChangeState {
        self.state
    }

    /// Apply an external decision.
    ///
    /// Only `PROPOSED -> ACCEPTED | REJECTED | IGNORED` is allowed, and the
    /// state is propagated to every contained change. Execution outcomes
    /// are derived by [`ChangeSet::check_state`], never set here.
    ///
    /// Returns whether the changeset is now in `state`.
    pub fn set_state(&mut self, state: ChangeState) -> bool {
        let decision = matches!(
            state,
            ChangeState::Accepted | ChangeState::Rejected | ChangeState::Ignored
        );
        if self.state == ChangeState::Proposed && decision {
            for change in &mut self.changes {
                change.state = state;
            }
            self.state = state;
        }
        self.state == state
    }

    /// Re-derive the state from the changes once accepted.
    ///
    /// Scans in order: an ACCEPTED change means execution is still in
    /// progress and nothing changes; the first change that is neither
    /// COMPLETED nor NOT_HANDLED makes the changeset FAILED; otherwise it
    /// is COMPLETED.
    pub fn check_state(&mut self) {
        if self.state != ChangeState::Accepted {
            return;
        }
        for change in &self.changes {
            if change.state == ChangeState::Accepted {
                return;
            }
            if !change.state.is_success() {
                self.state = ChangeState::Failed;
                return;
            }
        }
        self.state = ChangeState::Completed;
    }

    /// The state after [`ChangeSet::check_state`].
    pub fn get_state(&mut self) -> ChangeState {
        self.check_state();
        self.state
    }

    pub fn append(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Insert at `position`; positions past the end append.
    pub fn insert(&mut self, position: usize, change: Change) {
        let position = position.min(self.changes.len());
        self.changes.insert(position, change);
    }

    pub fn extend(&mut self, changes: impl IntoIterator<Item = Change>) {
        self.changes.extend(changes);
    }

    /// Take over the changes of another changeset.
    pub fn merge(&mut self, other: ChangeSet) {
        self.changes.extend(other.changes);
    }

    /// `subsystem:operation, ...`
    pub fn summary(&self) -> String {
        self.changes
            .iter()
            .map(Change::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Same actions in the same order, ignoring identity and state.
    pub fn same_changes(&self, other: &ChangeSet) -> bool {
        self.changes.len() == other.changes.len()
            && self
                .changes
                .iter()
                .zip(&other.changes)
                .all(|(a, b)| a.same_action(b))
    }
}

impl From<Change> for ChangeSet {
    fn from(change: Change) -> Self {
        Self::from_changes([change])
    }
}

impl From<Vec<Change>> for ChangeSet {
    fn from(changes: Vec<Change>) -> Self {
        Self::from_changes(changes)
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self::from_changes(iter)
    }
}
