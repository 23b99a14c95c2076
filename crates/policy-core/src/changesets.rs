//! The engine's changeset collection
//!
//! Each changeset lives behind its own mutex inside a [`ChangeSetHandle`].
//! The collection itself is guarded by a separate master mutex which is
//! only held while the list is read or extended. Locks are always taken in
//! the order master, then changeset; the worker only ever takes changeset
//! locks.

use crate::change::{ChangeSet, ChangeState};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use uuid::Uuid;

/// Shared reference to one collected changeset.
#[derive(Debug, Clone)]
pub struct ChangeSetHandle {
    id: Uuid,
    inner: Arc<Mutex<ChangeSet>>,
}

impl ChangeSetHandle {
    pub fn new(changeset: ChangeSet) -> Self {
        Self {
            id: changeset.id,
            inner: Arc::new(Mutex::new(changeset)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Acquire this changeset's lock.
    pub fn lock(&self) -> MutexGuard<'_, ChangeSet> {
        self.inner.lock()
    }

    /// The derived state, taken under the changeset lock.
    pub fn state(&self) -> ChangeState {
        self.lock().get_state()
    }

    /// A copy of the changeset as it is now.
    pub fn snapshot(&self) -> ChangeSet {
        self.lock().clone()
    }
}

/// All changesets collected by an engine, in insertion order.
#[derive(Debug, Default)]
pub struct ChangeSetStore {
    entries: Mutex<Vec<ChangeSetHandle>>,
}

impl ChangeSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, changeset: ChangeSet) -> ChangeSetHandle {
        let handle = ChangeSetHandle::new(changeset);
        self.entries.lock().push(handle.clone());
        handle
    }

    /// Handles of every collected changeset.
    pub fn all(&self) -> Vec<ChangeSetHandle> {
        self.entries.lock().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<ChangeSetHandle> {
        self.entries.lock().iter().find(|handle| handle.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Changesets whose derived state is `state`.
    pub fn with_state(&self, state: ChangeState) -> Vec<ChangeSetHandle> {
        self.all()
            .into_iter()
            .filter(|handle| handle.state() == state)
            .collect()
    }

    /// Whether a still-proposed changeset with the same changes is collected.
    pub fn has_proposed_like(&self, changeset: &ChangeSet) -> bool {
        self.all().iter().any(|handle| {
            let existing = handle.lock();
            existing.state() == ChangeState::Proposed && existing.same_changes(changeset)
        })
    }

    /// Forget every collected changeset.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
