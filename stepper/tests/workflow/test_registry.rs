//! Ordering and registration behavior seen through the handle

use super::common::*;
use stepper::{Identity, TaskState, WorkflowState};

#[test]
fn test_scrambled_orders_sorted() {
    let (stepper, _) = quiet_stepper();
    pass(&stepper, "setup", "third", 3.0);
    pass(&stepper, "setup", "first", 1.0);
    pass(&stepper, "setup", "second", 2.0);

    assert_eq!(task_names(&stepper, "setup"), vec!["first", "second", "third"]);
}

#[test]
fn test_equal_orders_keep_registration_order() {
    let (stepper, _) = quiet_stepper();
    pass(&stepper, "setup", "b", 1.0);
    pass(&stepper, "setup", "a", 1.0);
    pass(&stepper, "setup", "c", 0.5);

    assert_eq!(task_names(&stepper, "setup"), vec!["c", "b", "a"]);
}

#[test]
fn test_phases_in_first_seen_order() {
    let (stepper, _) = quiet_stepper();
    pass(&stepper, "cleanup", "archive", 1.0);
    pass(&stepper, "initialization", "logging", 1.0);
    pass(&stepper, "cleanup", "notify", 2.0);
    pass(&stepper, "data_processing", "fetch", 1.0);

    assert_eq!(
        stepper.phases(),
        vec!["cleanup", "initialization", "data_processing"]
    );
}

#[test]
fn test_same_step_registers_once() {
    let (stepper, _) = quiet_stepper();
    let step = stepper.step("setup", "init", 1.0).unwrap();
    assert!(step.run(|| true));
    assert!(step.run(|| true));
    assert!(step.clone().run(|| true));

    assert_eq!(stepper.snapshot().task_count(), 1);
}

#[test]
fn test_distinct_steps_with_equal_metadata_are_separate() {
    let (stepper, _) = quiet_stepper();
    pass(&stepper, "setup", "init", 1.0);
    pass(&stepper, "setup", "init", 1.0);

    assert_eq!(stepper.snapshot().task_count(), 2);
}

#[test]
fn test_named_identity_is_stable() {
    let (stepper, _) = quiet_stepper();
    for _ in 0..3 {
        let step = stepper
            .step_with_identity("setup", "init", 1.0, Identity::named("tests::init"))
            .unwrap();
        step.run(|| true);
    }
    assert_eq!(stepper.snapshot().task_count(), 1);
}

#[test]
fn test_declare_shows_pending_task() {
    let (stepper, _) = quiet_stepper();
    let later = stepper.step("setup", "later", 2.0).unwrap();
    stepper.declare(&later);
    stepper.declare(&later);

    assert_eq!(stepper.workflow_state(), WorkflowState::Running);
    let snapshot = stepper.snapshot();
    assert_eq!(snapshot.task_count(), 1);
    assert_eq!(snapshot.tasks().next().unwrap().state, TaskState::Pending);

    assert!(later.run(|| true));
    let snapshot = stepper.snapshot();
    assert_eq!(snapshot.task_count(), 1);
    assert_eq!(snapshot.tasks().next().unwrap().state, TaskState::Completed);
}

#[test]
fn test_reset_isolates_workflows() {
    let (stepper, _) = quiet_stepper();
    fail(&stepper, "first", "old", 1.0, "stale");
    stepper.reset();

    assert!(stepper.snapshot().is_empty());
    assert!(stepper.failures().is_empty());
    assert!(stepper.messages().is_empty());
    assert!(stepper.phases().is_empty());
    assert_eq!(stepper.workflow_state(), WorkflowState::NotStarted);

    pass(&stepper, "second", "new", 1.0);
    assert_eq!(stepper.phases(), vec!["second"]);
    assert_eq!(stepper.snapshot().task_count(), 1);
}

#[test]
fn test_reset_changes_run_id() {
    let (stepper, _) = quiet_stepper();
    let before = stepper.run_id();
    stepper.reset();
    assert_ne!(before, stepper.run_id());
}

#[test]
fn test_summary_then_new_task_starts_fresh_run() {
    let (stepper, _) = quiet_stepper();
    pass(&stepper, "one", "a", 1.0);
    stepper.summary();
    assert_eq!(stepper.workflow_state(), WorkflowState::NotStarted);

    pass(&stepper, "two", "b", 1.0);
    assert_eq!(stepper.phases(), vec!["two"]);
}

#[test]
fn test_start_workflow_is_idempotent() {
    let (stepper, _) = quiet_stepper();
    stepper.start_workflow().unwrap();
    pass(&stepper, "setup", "a", 1.0);
    stepper.start_workflow().unwrap();

    assert_eq!(stepper.workflow_state(), WorkflowState::Running);
    assert_eq!(stepper.snapshot().task_count(), 1);
}
