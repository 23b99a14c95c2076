//! Reconciliation and execution engine for declarative system policy
//!
//! This crate provides the core of the policy reconciler, implementing:
//!
//! - **Tree documents**: path-addressed policy and state documents with a
//!   structural diff ([`TreeStore`], [`compare_trees`])
//! - **Default inheritance**: policy sections inherit from `_default_`
//!   ([`PolicyView`])
//! - **Change model**: [`Change`] and all-or-nothing [`ChangeSet`] bundles
//!   with their lifecycle ([`ChangeState`])
//! - **Module contract**: the [`Module`] trait, diff dispatch and the
//!   [`ModuleRegistry`] of attribute handlers and event hooks
//! - **Engine**: diff, dispatch and collection of changesets ([`Engine`])
//! - **Worker**: serial background execution under per-changeset and
//!   per-module locks ([`Worker`])
//!
//! # Architecture
//!
//! ```text
//!                 policy-cli
//!                     |
//!               policy-modules
//!                     |
//!                policy-core
//!                     |
//!          +----------+----------+
//!          |                     |
//!      policy-fs           policy-blocks
//! ```
//!
//! Policy and state documents share a type name (e.g. `groups`). The
//! difference `policy.compare_to(state)` answers "what must change for the
//! state to become the policy"; each differing `[group, attribute]` is
//! handed to the module claiming that attribute, which proposes a
//! changeset ending in a `state:set_state` change. Once a changeset is
//! accepted and executed the state document records the new value.

pub mod change;
pub mod changesets;
pub mod config;
pub mod engine;
pub mod error;
pub mod module;
pub mod policy;
pub mod registry;
pub mod tree;
pub mod worker;

pub use change::{Change, ChangeSet, ChangeState, Parameters};
pub use changesets::{ChangeSetHandle, ChangeSetStore};
pub use config::{GeneralConfig, MainConfig};
pub use engine::Engine;
pub use error::{Error, ExecutionError, Result};
pub use module::{
    AttributeDiff, DiffRequest, EventCategory, HandledAttributes, Module, SET_STATE_OPERATION,
    STATE_MODULE, SharedStates, StateModule, check_diff, state_change,
};
pub use policy::{DEFAULT_SECTION, PolicySet, PolicyView, merge_into};
pub use registry::{ModuleRegistry, SharedModule};
pub use tree::{DiffOperation, TreeDiff, TreeStore, compare_trees, diff_operation, walk};
pub use worker::{WorkQueue, Worker};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn error_config_not_found_displays_correctly() {
        let path = PathBuf::from("/etc/policy/main.yaml");
        let error = Error::ConfigNotFound { path: path.clone() };

        let display = format!("{}", error);
        assert!(
            display.contains("/etc/policy/main.yaml"),
            "Error display should contain the path, got: {}",
            display
        );
    }

    #[test]
    fn handler_conflict_names_the_pair() {
        let error = Error::HandlerConflict {
            policy_type: "groups".into(),
            attribute: "shell".into(),
            existing: "shadow".into(),
        };
        let display = error.to_string();
        assert!(display.contains("'groups'") && display.contains("'shell'"));
    }
}
