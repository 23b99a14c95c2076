//! Background execution of accepted changesets
//!
//! A single named thread drains a FIFO of changeset handles. For each one
//! it holds the changeset lock for the whole run and the owning module's
//! lock around each individual change. Changes run strictly in order and
//! the first FAILED change stops the changeset; later ones keep their
//! ACCEPTED state, meaning "not attempted".

use crate::change::{Change, ChangeState};
use crate::changesets::ChangeSetHandle;
use crate::error::{Error, Result};
use crate::registry::ModuleRegistry;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    /// Pushed but not yet marked done
    unfinished: usize,
    shutdown: bool,
}

/// Blocking FIFO with completion tracking.
///
/// `push` never blocks. `pop` blocks until an item is available or the
/// queue is shut down and empty. Every popped item must be acknowledged
/// with `task_done` for `wait_idle` to return.
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    idle: Condvar,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                unfinished: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
        }
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an item; ignored once shut down.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.shutdown {
            return false;
        }
        state.items.push_back(item);
        state.unfinished += 1;
        self.available.notify_one();
        true
    }

    /// Dequeue the next item, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is shut down and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.shutdown {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Mark one popped item as finished.
    pub fn task_done(&self) {
        let mut state = self.state.lock();
        state.unfinished = state.unfinished.saturating_sub(1);
        if state.unfinished == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until every pushed item has been popped and marked done.
    pub fn wait_idle(&self) {
        let mut state = self.state.lock();
        while state.unfinished > 0 {
            self.idle.wait(&mut state);
        }
    }

    /// Items waiting to be popped.
    pub fn pending(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Refuse new items and wake every blocked consumer.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.available.notify_all();
    }
}

/// The single background executor.
#[derive(Debug)]
pub struct Worker {
    queue: Arc<WorkQueue<ChangeSetHandle>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread.
    pub fn spawn(registry: Arc<RwLock<ModuleRegistry>>) -> Result<Self> {
        let queue = Arc::new(WorkQueue::new());
        let consumer = Arc::clone(&queue);
        let thread = thread::Builder::new()
            .name("policy-worker".into())
            .spawn(move || run(&consumer, &registry))
            .map_err(|e| Error::WorkerStopped {
                message: e.to_string(),
            })?;

        Ok(Self {
            queue,
            thread: Some(thread),
        })
    }

    /// Queue a changeset for execution.
    pub fn enqueue(&self, handle: ChangeSetHandle) -> Result<()> {
        tracing::debug!(changeset = %handle.id(), "Enqueued changeset");
        if self.queue.push(handle) {
            Ok(())
        } else {
            Err(Error::WorkerStopped {
                message: "queue is shut down".into(),
            })
        }
    }

    /// Block until every queued changeset has been executed.
    pub fn wait_idle(&self) {
        self.queue.wait_idle();
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Drain the queue and stop the thread.
    pub fn shutdown(&mut self) {
        self.queue.shutdown();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("Worker thread panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(queue: &WorkQueue<ChangeSetHandle>, registry: &RwLock<ModuleRegistry>) {
    while let Some(handle) = queue.pop() {
        execute(&handle, registry);
        queue.task_done();
    }
    tracing::debug!("Worker stopped");
}

/// Run every change of one accepted changeset under its lock.
pub(crate) fn execute(handle: &ChangeSetHandle, registry: &RwLock<ModuleRegistry>) {
    let mut changeset = handle.lock();
    if changeset.state() != ChangeState::Accepted {
        tracing::warn!(
            changeset = %handle.id(),
            state = %changeset.state(),
            "Skipping changeset that is not accepted"
        );
        return;
    }

    for index in 0..changeset.len() {
        let change = changeset.changes()[index].clone();
        let outcome = perform(&change, registry);
        changeset.changes_mut()[index].state = outcome;
        if outcome == ChangeState::Failed {
            break;
        }
    }

    changeset.check_state();
    tracing::info!(changeset = %handle.id(), state = %changeset.state(), "Executed changeset");
}

/// Perform one change under its module's lock; every failure is FAILED.
fn perform(change: &Change, registry: &RwLock<ModuleRegistry>) -> ChangeState {
    let Some(module) = registry.read().get(&change.subsystem) else {
        tracing::error!(change = %change.describe(), "No module named '{}'", change.subsystem);
        return ChangeState::Failed;
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| module.lock().perform_change(change)));
    match result {
        Ok(Ok(state)) if state.is_terminal() => {
            tracing::debug!(change = %change.describe(), %state, "Performed change");
            state
        }
        Ok(Ok(state)) => {
            tracing::error!(change = %change.describe(), %state, "Module returned a non-final state");
            ChangeState::Failed
        }
        Ok(Err(e)) => {
            tracing::error!(change = %change.describe(), error = %e, "Change failed");
            ChangeState::Failed
        }
        Err(_) => {
            tracing::error!(change = %change.describe(), "Module panicked while performing change");
            ChangeState::Failed
        }
    }
}
