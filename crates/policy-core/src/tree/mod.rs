//! Hierarchical key/value documents
//!
//! A [`TreeStore`] is a mapping from string keys to scalars, sequences or
//! nested mappings, addressed by key paths. Policy and state documents are
//! both tree stores; [`TreeStore::compare_to`] computes what must change to
//! turn one into the other.

mod diff;

pub use diff::{DiffOperation, MAX_DIFF_DEPTH, TreeDiff, compare_trees, diff_operation};

use crate::{Error, Result};
use policy_fs::{NormalizedPath, load_document, save_document};
use serde_json::{Map, Value};

/// A named hierarchical document with an optional backing file.
///
/// The root is always a mapping. Loading a document whose root is not a
/// mapping (including an empty file) yields an empty mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreeStore {
    name: String,
    source: Option<NormalizedPath>,
    data: Map<String, Value>,
}

impl TreeStore {
    /// Create an empty store.
    pub fn new(name: impl Into<String>, source: Option<NormalizedPath>) -> Self {
        Self {
            name: name.into(),
            source,
            data: Map::new(),
        }
    }

    /// Create a store from an in-memory value, without a backing file.
    pub fn from_value(name: impl Into<String>, value: Value) -> Self {
        let mut store = Self::new(name, None);
        store.replace_root(value);
        store
    }

    /// Create a store and load it from `source`.
    pub fn open(name: impl Into<String>, source: NormalizedPath) -> Result<Self> {
        let mut store = Self::new(name, Some(source));
        store.load()?;
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> Option<&NormalizedPath> {
        self.source.as_ref()
    }

    /// The root mapping.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    /// Reload from the backing file.
    ///
    /// # Errors
    ///
    /// Fails with an I/O error if the file is inaccessible and a parse error
    /// if it is malformed. The caller decides whether a missing file is fatal.
    pub fn load(&mut self) -> Result<()> {
        let source = self.require_source()?.clone();
        let value: Option<Value> = load_document(&source)?;
        self.replace_root(value.unwrap_or(Value::Null));
        tracing::debug!(name = %self.name, path = %source, sections = self.data.len(), "loaded document");
        Ok(())
    }

    /// Persist to the backing file.
    pub fn save(&self) -> Result<()> {
        let source = self.require_source()?;
        save_document(source, &self.data)?;
        tracing::debug!(name = %self.name, path = %source, "saved document");
        Ok(())
    }

    /// Value at `path`, or `None` if any segment is absent.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        walk(&self.data, path)
    }

    /// Set the value at `path`, creating intermediate mappings as needed.
    ///
    /// Setting `Value::Null` deletes the leaf instead of storing null. Any
    /// non-mapping value found along the path is replaced by a mapping.
    pub fn set<S: AsRef<str>>(&mut self, path: &[S], value: Value) {
        let Some((leaf, parents)) = path.split_last() else {
            self.replace_root(value);
            return;
        };

        let mut branch = &mut self.data;
        for node in parents {
            let entry = branch
                .entry(node.as_ref().to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                unreachable!("entry was just made a mapping");
            };
            branch = next;
        }

        if value.is_null() {
            branch.remove(leaf.as_ref());
        } else {
            branch.insert(leaf.as_ref().to_string(), value);
        }
    }

    /// Delete the leaf at `path`.
    pub fn remove<S: AsRef<str>>(&mut self, path: &[S]) {
        self.set(path, Value::Null);
    }

    /// Top-level section names.
    pub fn sections(&self) -> Vec<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// Attribute names of a section, or empty if it is not a mapping.
    pub fn attributes(&self, section: &str) -> Vec<&str> {
        match self.data.get(section) {
            Some(Value::Object(map)) => map.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn contains_section(&self, section: &str) -> bool {
        self.data.contains_key(section)
    }

    /// Empty the document.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Differences that must be applied to `other` to make it equal `self`.
    pub fn compare_to(&self, other: &TreeStore) -> TreeDiff {
        compare_trees(&self.data, &other.data)
    }

    /// Render the document as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.data).map_err(|e| Error::InvalidConfig {
            message: format!("cannot render '{}' as YAML: {}", self.name, e),
        })
    }

    fn replace_root(&mut self, value: Value) {
        self.data = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
    }

    fn require_source(&self) -> Result<&NormalizedPath> {
        self.source.as_ref().ok_or_else(|| Error::NoSource {
            name: self.name.clone(),
        })
    }
}

/// Walk a mapping along `path`.
pub fn walk<'a, S: AsRef<str>>(tree: &'a Map<String, Value>, path: &[S]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut branch = tree.get(first.as_ref())?;
    for node in rest {
        branch = branch.as_object()?.get(node.as_ref())?;
    }
    Some(branch)
}
