//! The reconciliation engine
//!
//! [`Engine`] pairs every policy with its state document, diffs them,
//! routes each differing attribute to the module that claims it (or the
//! state module) and collects the resulting changesets. Acceptance is
//! driven entirely by the caller; accepted changesets are handed to the
//! background [`Worker`].
//!
//! ```ignore
//! let config = MainConfig::load(&MainConfig::locate(None)?)?;
//! let engine = Engine::open(&config, ModuleRegistry::new())?;
//!
//! engine.get_policy_updates()?;
//! engine.accept_state_changes();
//! engine.enqueue_changesets(engine.changesets_with_state(ChangeState::Accepted))?;
//! engine.wait_idle();
//! engine.save_state()?;
//! ```

use crate::change::{ChangeSet, ChangeState};
use crate::changesets::{ChangeSetHandle, ChangeSetStore};
use crate::config::MainConfig;
use crate::error::{Error, Result};
use crate::module::{
    DiffRequest, EventCategory, Module, SET_STATE_OPERATION, STATE_MODULE, SharedStates,
    StateModule, check_diff,
};
use crate::policy::{PolicySet, PolicyView};
use crate::registry::ModuleRegistry;
use crate::tree::{DiffOperation, TreeDiff, diff_operation};
use crate::worker::Worker;
use parking_lot::{Mutex, RwLock};
use policy_fs::NormalizedPath;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Owns policies, states, modules and changesets.
pub struct Engine {
    policies: PolicySet,
    states: SharedStates,
    registry: Arc<RwLock<ModuleRegistry>>,
    changesets: ChangeSetStore,
    worker: Worker,
}

impl Engine {
    /// Build an engine from loaded documents.
    ///
    /// Policies without a state document get an empty one. The state
    /// module is registered unless the registry already has one, and the
    /// worker thread is started.
    pub fn new(policies: PolicySet, mut states: PolicySet, mut registry: ModuleRegistry) -> Result<Self> {
        for name in policies.keys() {
            states
                .entry(name.clone())
                .or_insert_with(|| PolicyView::empty(name.clone(), None));
        }
        let states: SharedStates = Arc::new(Mutex::new(states));

        if !registry.contains(STATE_MODULE) {
            registry.register(Box::new(StateModule::new(Arc::clone(&states))))?;
        }
        let registry = Arc::new(RwLock::new(registry));
        let worker = Worker::spawn(Arc::clone(&registry))?;

        Ok(Self {
            policies,
            states,
            registry,
            changesets: ChangeSetStore::new(),
            worker,
        })
    }

    /// Load every policy and state document named by the configuration.
    ///
    /// A state document that cannot be read is treated as "no prior
    /// state": an empty one is created and saved immediately. A policy
    /// that cannot be read, or a state document that cannot be parsed, is
    /// fatal.
    pub fn open(config: &MainConfig, registry: ModuleRegistry) -> Result<Self> {
        let mut policies = PolicySet::new();
        let mut states = PolicySet::new();

        let (policy_dir, state_dir) = (config.policy_dir(), config.state_dir());
        for (name, file) in &config.policy {
            let policy = PolicyView::open(name.as_str(), policy_dir.join(file), true)?;
            tracing::debug!(policy = name.as_str(), sections = policy.sections().len(), "Loaded policy");
            policies.insert(name.clone(), policy);
            states.insert(name.clone(), load_state(name, state_dir.join(file))?);
        }

        Self::new(policies, states, registry)
    }

    /// Bind another module.
    pub fn register_module(&self, module: Box<dyn Module>) -> Result<()> {
        self.registry.write().register(module)
    }

    /// Names of every registered module.
    pub fn module_names(&self) -> Vec<String> {
        self.registry.read().names().into_iter().map(String::from).collect()
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn policy(&self, name: &str) -> Option<&PolicyView> {
        self.policies.get(name)
    }

    /// A copy of the current state document of a policy.
    pub fn state(&self, name: &str) -> Option<PolicyView> {
        self.states.lock().get(name).cloned()
    }

    /// Record `value` at `path` in a state document; null deletes the leaf.
    pub fn set_state<S: AsRef<str>>(&self, policy: &str, path: &[S], value: Value) -> Result<()> {
        let mut states = self.states.lock();
        let state = states.get_mut(policy).ok_or_else(|| Error::UnknownPolicy {
            name: policy.to_string(),
        })?;
        state.set(path, value);
        Ok(())
    }

    /// Persist every state document that has a backing file.
    pub fn save_state(&self) -> Result<()> {
        let states = self.states.lock();
        for (name, state) in states.iter() {
            if state.tree().source().is_none() {
                tracing::debug!(policy = name.as_str(), "State has no backing file, not saved");
                continue;
            }
            state.save()?;
            tracing::info!(policy = name.as_str(), "Saved state");
        }
        Ok(())
    }

    /// Forget all recorded state so the whole policy is re-applied.
    pub fn clear_state(&self) {
        for state in self.states.lock().values_mut() {
            state.clear();
        }
    }

    /// What must change in each state document to match its policy.
    pub fn policy_diff(&self) -> BTreeMap<String, TreeDiff> {
        self.policies
            .iter()
            .map(|(name, policy)| (name.clone(), self.diff_against_state(name, policy)))
            .collect()
    }

    fn diff_against_state(&self, name: &str, policy: &PolicyView) -> TreeDiff {
        match self.states.lock().get(name) {
            Some(state) => policy.compare_to(state),
            None => policy.data().clone(),
        }
    }

    /// Turn every policy difference into a proposed changeset.
    ///
    /// Each differing attribute is routed to the module claiming it. A
    /// group whose difference is not a mapping (a scalar or sequence
    /// section, or one replacing a mapping) is recorded whole by the
    /// state module. Each changeset passes through the `PolicyUpdate`
    /// event before it is collected. A changeset identical to one that is
    /// still proposed is not collected twice, so repeated calls without
    /// intervening changes add nothing. State is never modified here.
    ///
    /// Returns the newly collected changesets.
    pub fn get_policy_updates(&self) -> Result<Vec<ChangeSetHandle>> {
        let mut collected = Vec::new();

        for (policy_type, policy) in &self.policies {
            for (group, attributes) in &self.diff_against_state(policy_type, policy) {
                let Value::Object(attributes) = attributes else {
                    tracing::debug!(
                        policy = policy_type.as_str(),
                        group = group.as_str(),
                        "Section is not a mapping, recording it whole"
                    );
                    let path = vec![group.clone()];
                    collected.extend(self.propose_difference(policy, &path, STATE_MODULE, attributes)?);
                    continue;
                };

                for (attribute, detail) in attributes {
                    let path = vec![group.clone(), attribute.clone()];
                    let handler = self
                        .registry
                        .read()
                        .handler_name(policy_type, attribute)
                        .unwrap_or(STATE_MODULE)
                        .to_string();
                    collected.extend(self.propose_difference(policy, &path, &handler, detail)?);
                }
            }
        }

        Ok(collected)
    }

    /// Build, announce and collect the changeset for one difference.
    fn propose_difference(
        &self,
        policy: &PolicyView,
        path: &[String],
        handler: &str,
        detail: &Value,
    ) -> Result<Option<ChangeSetHandle>> {
        let (value, operation) = match path.first() {
            Some(group) if policy.contains_section(group) => {
                let operation = match self.states.lock().get(policy.name()) {
                    Some(state) => diff_operation(policy.data(), state.data(), path),
                    None => DiffOperation::Added,
                };
                (policy.get(path), operation)
            }
            _ => (None, DiffOperation::Removed),
        };

        let Some(module) = self.registry.read().get(handler) else {
            tracing::warn!(
                policy = policy.name(),
                path = ?path,
                module = handler,
                "No handler and no state module registered"
            );
            return Ok(None);
        };

        let request = DiffRequest {
            policy: policy.name(),
            operation,
            path,
            value: value.as_ref(),
            detail,
        };
        let mut changeset = {
            let mut module = module.lock();
            tracing::debug!(policy = policy.name(), path = ?path, module = module.name(), "Resolved handler");
            check_diff(&mut **module, &request)
        };

        self.emit_event(EventCategory::PolicyUpdate, &mut changeset)?;
        if self.changesets.has_proposed_like(&changeset) {
            tracing::debug!(summary = %changeset.summary(), "Changeset already proposed");
            return Ok(None);
        }
        Ok(Some(self.changesets.add(changeset)))
    }

    /// Run every hook registered for `event` on `changeset`, in registration order.
    pub fn emit_event(&self, event: EventCategory, changeset: &mut ChangeSet) -> Result<()> {
        let hooks = self.registry.read().hooks_for(event);
        for module in hooks {
            let mut module = module.lock();
            module
                .handle_event(event, changeset, &self.policies)
                .map_err(|source| Error::Hook {
                    event: event.to_string(),
                    module: module.name().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Emit `event` for a changeset, then collect it.
    pub fn propose(&self, event: EventCategory, mut changeset: ChangeSet) -> Result<ChangeSetHandle> {
        self.emit_event(event, &mut changeset)?;
        Ok(self.add_changeset(changeset))
    }

    pub fn add_changeset(&self, changeset: ChangeSet) -> ChangeSetHandle {
        tracing::debug!(changeset = %changeset.id, summary = %changeset.summary(), "Collected changeset");
        self.changesets.add(changeset)
    }

    /// Accept or reject a proposed changeset.
    ///
    /// Returns whether the decision took effect; a changeset that was
    /// already decided keeps its state.
    pub fn accept_changeset(&self, id: Uuid, accepted: bool) -> Result<bool> {
        let handle = self
            .changesets
            .get(id)
            .ok_or(Error::UnknownChangeSet { id })?;
        let state = if accepted {
            ChangeState::Accepted
        } else {
            ChangeState::Rejected
        };
        Ok(handle.lock().set_state(state))
    }

    /// Accept every proposed changeset made only of state-recording changes.
    ///
    /// Returns the number of changesets accepted.
    pub fn accept_state_changes(&self) -> usize {
        let mut accepted = 0;
        for handle in self.changesets.all() {
            let mut changeset = handle.lock();
            let only_state = !changeset.is_empty()
                && changeset.changes().iter().all(|change| {
                    change.subsystem == STATE_MODULE && change.operation == SET_STATE_OPERATION
                });
            if only_state
                && changeset.state() == ChangeState::Proposed
                && changeset.set_state(ChangeState::Accepted)
            {
                accepted += 1;
            }
        }
        tracing::debug!(accepted, "Auto-accepted state changesets");
        accepted
    }

    /// Every collected changeset, in collection order.
    pub fn changesets(&self) -> Vec<ChangeSetHandle> {
        self.changesets.all()
    }

    pub fn changeset(&self, id: Uuid) -> Option<ChangeSetHandle> {
        self.changesets.get(id)
    }

    pub fn changesets_with_state(&self, state: ChangeState) -> Vec<ChangeSetHandle> {
        self.changesets.with_state(state)
    }

    /// Hand changesets to the worker; never blocks.
    pub fn enqueue_changesets(&self, changesets: impl IntoIterator<Item = ChangeSetHandle>) -> Result<()> {
        for handle in changesets {
            self.worker.enqueue(handle)?;
        }
        Ok(())
    }

    /// Block until every enqueued changeset has been executed.
    pub fn wait_idle(&self) {
        self.worker.wait_idle();
    }

    /// Drain the queue and stop the worker.
    pub fn shutdown(&mut self) {
        self.worker.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("policies", &self.policies.keys().collect::<Vec<_>>())
            .field("registry", &*self.registry.read())
            .field("changesets", &self.changesets.len())
            .finish()
    }
}

fn load_state(name: &str, source: NormalizedPath) -> Result<PolicyView> {
    match PolicyView::open(name, source.clone(), false) {
        Ok(state) => Ok(state),
        Err(e) if e.is_io() => {
            tracing::warn!(policy = name, path = %source, error = %e, "State not readable, starting empty");
            let state = PolicyView::empty(name, Some(source));
            state.save()?;
            Ok(state)
        }
        Err(e) => Err(e),
    }
}
