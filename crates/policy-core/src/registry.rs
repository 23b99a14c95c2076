//! Module registry
//!
//! Owns every registered module behind its own mutex, the
//! `(policy type, attribute) -> module` handler bindings and the ordered
//! event hook lists. The registry is built by the caller and handed to the
//! engine; there is no process-wide instance.

use crate::error::{Error, Result};
use crate::module::{EventCategory, Module, STATE_MODULE};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A registered module; the mutex is the per-module execution lock.
pub type SharedModule = Arc<Mutex<Box<dyn Module>>>;

/// Registered modules and their bindings.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, SharedModule>,
    /// policy type -> attribute -> module name
    handlers: BTreeMap<String, BTreeMap<String, String>>,
    /// event -> module names in registration order
    hooks: BTreeMap<EventCategory, Vec<String>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a module under its name.
    ///
    /// Fails if a module of the same name is registered or if any claimed
    /// attribute already has a handler. A failed registration binds
    /// nothing.
    pub fn register(&mut self, module: Box<dyn Module>) -> Result<()> {
        let name = module.name().to_string();
        if self.modules.contains_key(&name) {
            return Err(Error::ModuleAlreadyRegistered { name });
        }

        let attributes = module.handled_attributes();
        for (policy_type, claimed) in &attributes {
            for attribute in claimed {
                if let Some(existing) = self.handler_name(policy_type, attribute) {
                    return Err(Error::HandlerConflict {
                        policy_type: policy_type.clone(),
                        attribute: attribute.clone(),
                        existing: existing.to_string(),
                    });
                }
            }
        }

        for (policy_type, claimed) in attributes {
            let bindings = self.handlers.entry(policy_type.clone()).or_default();
            for attribute in claimed {
                tracing::debug!(
                    policy = policy_type.as_str(),
                    attribute = attribute.as_str(),
                    module = name.as_str(),
                    "Registered attribute handler"
                );
                bindings.insert(attribute, name.clone());
            }
        }

        for event in module.event_hooks() {
            let hooked = self.hooks.entry(event).or_default();
            if !hooked.contains(&name) {
                tracing::debug!(%event, module = name.as_str(), "Registered event hook");
                hooked.push(name.clone());
            }
        }

        self.modules.insert(name, Arc::new(Mutex::new(module)));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<SharedModule> {
        self.modules.get(name).cloned()
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Name of the module claiming `attribute` of `policy_type`, if any.
    pub fn handler_name(&self, policy_type: &str, attribute: &str) -> Option<&str> {
        self.handlers
            .get(policy_type)
            .and_then(|bindings| bindings.get(attribute))
            .map(String::as_str)
    }

    /// The handler for an attribute, falling back to the state module.
    pub fn resolve(&self, policy_type: &str, attribute: &str) -> Option<SharedModule> {
        let name = self
            .handler_name(policy_type, attribute)
            .unwrap_or(STATE_MODULE);
        self.get(name)
    }

    /// Modules hooked into `event`, in registration order.
    pub fn hooks_for(&self, event: EventCategory) -> Vec<SharedModule> {
        self.hooks
            .get(&event)
            .map(|names| names.iter().filter_map(|name| self.get(name)).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers)
            .field("hooks", &self.hooks)
            .finish()
    }
}
