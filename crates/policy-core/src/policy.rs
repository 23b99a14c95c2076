//! Policy documents with default-section inheritance
//!
//! Every section of a policy inherits from the reserved `_default_`
//! section. Inheritance is applied twice: once on load (when requested),
//! where each section is rebuilt as the defaults overlaid with the
//! section's own values, and again on every read, where a missing path
//! falls back to the default section's value at the same path.

use crate::Result;
use crate::tree::{TreeDiff, TreeStore};
use policy_fs::NormalizedPath;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The section holding inheritable defaults
pub const DEFAULT_SECTION: &str = "_default_";

/// Policy views keyed by policy type (e.g. `groups`, `services`).
pub type PolicySet = BTreeMap<String, PolicyView>;

/// A tree store with default-section inheritance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyView {
    tree: TreeStore,
}

impl PolicyView {
    /// Wrap an existing tree without merging defaults.
    pub fn new(tree: TreeStore) -> Self {
        Self { tree }
    }

    /// An empty view with a backing location.
    pub fn empty(name: impl Into<String>, source: Option<NormalizedPath>) -> Self {
        Self::new(TreeStore::new(name, source))
    }

    /// Load a policy from `source`, optionally merging defaults into every section.
    pub fn open(name: impl Into<String>, source: NormalizedPath, merge_default: bool) -> Result<Self> {
        let mut view = Self::new(TreeStore::open(name, source)?);
        view.normalize(merge_default);
        Ok(view)
    }

    /// Build a view from an in-memory value.
    pub fn from_value(name: impl Into<String>, value: Value, merge_default: bool) -> Self {
        let mut view = Self::new(TreeStore::from_value(name, value));
        view.normalize(merge_default);
        view
    }

    /// Reload from the backing file.
    pub fn load(&mut self, merge_default: bool) -> Result<()> {
        self.tree.load()?;
        self.normalize(merge_default);
        Ok(())
    }

    /// Null values are unset and never kept.
    fn normalize(&mut self, merge_default: bool) {
        if merge_default {
            self.merge_defaults();
        }
        strip_nulls(self.tree.data_mut());
    }

    /// Replace every non-default mapping section with the defaults overlaid by it.
    ///
    /// The default section itself is left untouched.
    pub fn merge_defaults(&mut self) {
        let Some(Value::Object(defaults)) = self.tree.data().get(DEFAULT_SECTION).cloned() else {
            return;
        };

        for (section, value) in self.tree.data_mut().iter_mut() {
            if section == DEFAULT_SECTION {
                continue;
            }
            if let Value::Object(own) = value {
                let mut merged = defaults.clone();
                merge_into(&mut merged, own);
                *own = merged;
            }
        }
    }

    /// Value at `path`, falling back to the default section.
    ///
    /// When both the direct value and the default are mappings the result
    /// is the default overlaid with the direct value. The stored default
    /// section is never modified.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        let Some((_, rest)) = path.split_first() else {
            return Some(Value::Object(self.tree.data().clone()));
        };

        let value = self.tree.get(path);
        let mut default_path: Vec<&str> = Vec::with_capacity(path.len());
        default_path.push(DEFAULT_SECTION);
        default_path.extend(rest.iter().map(AsRef::as_ref));
        let default = self.tree.get(&default_path);

        match (value, default) {
            (None, Some(default)) => Some(default.clone()),
            (Some(Value::Object(own)), Some(Value::Object(default))) => {
                let mut merged = default.clone();
                merge_into(&mut merged, own);
                Some(Value::Object(merged))
            }
            (value, _) => value.cloned(),
        }
    }

    /// Set the value at `path`; null deletes the leaf.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: Value) {
        self.tree.set(path, value);
    }

    pub fn name(&self) -> &str {
        self.tree.name()
    }

    pub fn tree(&self) -> &TreeStore {
        &self.tree
    }

    pub fn data(&self) -> &Map<String, Value> {
        self.tree.data()
    }

    pub fn sections(&self) -> Vec<&str> {
        self.tree.sections()
    }

    pub fn attributes(&self, section: &str) -> Vec<&str> {
        self.tree.attributes(section)
    }

    pub fn contains_section(&self, section: &str) -> bool {
        self.tree.contains_section(section)
    }

    pub fn save(&self) -> Result<()> {
        self.tree.save()
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Raw structural diff against another view (defaults are not re-applied).
    pub fn compare_to(&self, other: &PolicyView) -> TreeDiff {
        self.tree.compare_to(&other.tree)
    }
}

/// Overlay `overlay` onto `base`, recursing where both sides are mappings.
pub fn merge_into(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, item) in overlay {
        if let (Some(Value::Object(base_map)), Value::Object(overlay_map)) =
            (base.get_mut(key), item)
        {
            merge_into(base_map, overlay_map);
            continue;
        }
        base.insert(key.clone(), item.clone());
    }
}

fn strip_nulls(map: &mut Map<String, Value>) {
    map.retain(|_, value| !value.is_null());
    for value in map.values_mut() {
        if let Value::Object(nested) = value {
            strip_nulls(nested);
        }
    }
}
