//! Tests for background execution of changesets

use parking_lot::{Mutex, RwLock};
use policy_core::{
    Change, ChangeSet, ChangeSetHandle, ChangeState, Engine, ExecutionError, Module,
    ModuleRegistry, PolicySet, WorkQueue, Worker,
};
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Executes `ok`, `fail`, `panic` and `skip`; records the order of calls.
struct Steps {
    log: Arc<Mutex<Vec<String>>>,
}

impl Module for Steps {
    fn name(&self) -> &str {
        "steps"
    }

    fn perform_change(&mut self, change: &Change) -> Result<ChangeState, ExecutionError> {
        let label = change.param_str("label").unwrap_or_default().to_string();
        self.log.lock().push(label);
        match change.operation.as_str() {
            "ok" => Ok(ChangeState::Completed),
            "fail" => Err(ExecutionError::module("steps", "disk on fire")),
            "panic" => panic!("module bug"),
            "stall" => Ok(ChangeState::Accepted),
            _ => Ok(ChangeState::NotHandled),
        }
    }
}

fn step(operation: &str, label: &str) -> Change {
    Change::with_params("steps", operation, json!({"label": label}))
}

fn engine() -> (Engine, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ModuleRegistry::new();
    registry
        .register(Box::new(Steps { log: log.clone() }))
        .unwrap();
    let engine = Engine::new(PolicySet::new(), PolicySet::new(), registry).unwrap();
    (engine, log)
}

fn run(engine: &Engine, changeset: ChangeSet) -> ChangeSetHandle {
    let handle = engine.add_changeset(changeset);
    assert!(engine.accept_changeset(handle.id(), true).unwrap());
    engine.enqueue_changesets([handle.clone()]).unwrap();
    engine.wait_idle();
    handle
}

#[test]
fn first_failure_stops_the_changeset() {
    let (engine, log) = engine();
    let handle = run(
        &engine,
        ChangeSet::from(vec![step("ok", "1"), step("fail", "2"), step("ok", "3")]),
    );

    let changeset = handle.snapshot();
    assert_eq!(changeset.changes()[0].state, ChangeState::Completed);
    assert_eq!(changeset.changes()[1].state, ChangeState::Failed);
    assert_eq!(changeset.changes()[2].state, ChangeState::Accepted);
    assert_eq!(handle.state(), ChangeState::Failed);
    assert_eq!(*log.lock(), vec!["1", "2"]);
}

#[test]
fn unhandled_operations_count_as_success() {
    let (engine, _) = engine();
    let handle = run(
        &engine,
        ChangeSet::from(vec![step("ok", "1"), step("unknown", "2")]),
    );

    assert_eq!(handle.snapshot().changes()[1].state, ChangeState::NotHandled);
    assert_eq!(handle.state(), ChangeState::Completed);
}

#[test]
fn panicking_module_fails_the_change_and_worker_survives() {
    let (engine, log) = engine();
    let broken = run(&engine, ChangeSet::from(vec![step("panic", "p"), step("ok", "after")]));
    assert_eq!(broken.snapshot().changes()[0].state, ChangeState::Failed);
    assert_eq!(broken.state(), ChangeState::Failed);

    let next = run(&engine, ChangeSet::from(step("ok", "next")));
    assert_eq!(next.state(), ChangeState::Completed);
    assert_eq!(*log.lock(), vec!["p", "next"]);
}

#[test]
fn unknown_subsystem_fails_the_change() {
    let (engine, _) = engine();
    let handle = run(
        &engine,
        ChangeSet::from(Change::with_params("nobody", "ok", json!({}))),
    );
    assert_eq!(handle.state(), ChangeState::Failed);
}

#[test]
fn non_final_module_result_fails_the_change() {
    let (engine, _) = engine();
    let handle = run(&engine, ChangeSet::from(step("stall", "s")));
    assert_eq!(handle.snapshot().changes()[0].state, ChangeState::Failed);
    assert_eq!(handle.state(), ChangeState::Failed);
}

#[test]
fn changesets_run_in_queue_order_and_failures_are_isolated() {
    let (engine, log) = engine();
    let handles: Vec<_> = [
        ChangeSet::from(vec![step("ok", "a1"), step("ok", "a2")]),
        ChangeSet::from(vec![step("fail", "b1"), step("ok", "b2")]),
        ChangeSet::from(step("ok", "c1")),
    ]
    .into_iter()
    .map(|cs| {
        let handle = engine.add_changeset(cs);
        engine.accept_changeset(handle.id(), true).unwrap();
        handle
    })
    .collect();

    engine.enqueue_changesets(handles.clone()).unwrap();
    engine.wait_idle();

    assert_eq!(*log.lock(), vec!["a1", "a2", "b1", "c1"]);
    assert_eq!(handles[0].state(), ChangeState::Completed);
    assert_eq!(handles[1].state(), ChangeState::Failed);
    assert_eq!(handles[2].state(), ChangeState::Completed);
}

#[test]
fn proposed_changeset_is_not_executed() {
    let (engine, log) = engine();
    let handle = engine.add_changeset(ChangeSet::from(step("ok", "1")));
    engine.enqueue_changesets([handle.clone()]).unwrap();
    engine.wait_idle();

    assert!(log.lock().is_empty());
    assert_eq!(handle.state(), ChangeState::Proposed);
}

#[test]
fn decision_after_acceptance_is_ignored_during_execution() {
    let (engine, _) = engine();
    let handle = run(&engine, ChangeSet::from(step("ok", "1")));

    assert!(!engine.accept_changeset(handle.id(), false).unwrap());
    assert_eq!(handle.state(), ChangeState::Completed);
}

#[test]
fn shutdown_drains_pending_work() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ModuleRegistry::new();
    registry
        .register(Box::new(Steps { log: log.clone() }))
        .unwrap();
    let mut worker = Worker::spawn(Arc::new(RwLock::new(registry))).unwrap();

    let mut changeset = ChangeSet::from(step("ok", "queued"));
    changeset.set_state(ChangeState::Accepted);
    let handle = ChangeSetHandle::new(changeset);
    worker.enqueue(handle.clone()).unwrap();
    worker.shutdown();

    assert_eq!(handle.state(), ChangeState::Completed);
    assert!(worker.enqueue(handle).is_err());
}

#[test]
fn queue_wait_idle_waits_for_task_done() {
    let queue = Arc::new(WorkQueue::new());
    queue.push(1);
    queue.push(2);
    assert_eq!(queue.pending(), 2);

    let consumer = Arc::clone(&queue);
    let worker = thread::spawn(move || {
        let mut seen = Vec::new();
        while let Some(item) = consumer.pop() {
            thread::sleep(Duration::from_millis(10));
            seen.push(item);
            consumer.task_done();
        }
        seen
    });

    queue.wait_idle();
    assert_eq!(queue.pending(), 0);
    queue.shutdown();
    assert_eq!(worker.join().unwrap(), vec![1, 2]);
}
