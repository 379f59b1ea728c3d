//! Result normalization and failure capture in the step wrapper

use super::common::*;
use stepper::{Outcome, StepResult, TaskState};

#[test]
fn test_true_is_success() {
    let (stepper, _) = quiet_stepper();
    assert!(stepper.step("p", "t", 1.0).unwrap().run(|| true));

    let snapshot = stepper.snapshot();
    let task = snapshot.tasks().next().unwrap();
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.outcome, Some(Outcome::Success));
    assert!(task.message.is_empty());
    assert!(stepper.failures().is_empty());
}

#[test]
fn test_false_with_message_logs_one_failure() {
    let (stepper, _) = quiet_stepper();
    assert!(!fail(&stepper, "setup", "config", 1.0, "X"));

    let failures = stepper.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].phase, "setup");
    assert_eq!(failures[0].task, "config");
    assert_eq!(failures[0].message, "X");
}

#[test]
fn test_plain_false_has_empty_message() {
    let (stepper, _) = quiet_stepper();
    assert!(!stepper.step("p", "t", 1.0).unwrap().run(|| false));
    assert_eq!(stepper.failures()[0].message, "");
}

#[test]
fn test_unit_and_optional_message_shapes() {
    let (stepper, _) = quiet_stepper();
    assert!(stepper.step("p", "unit", 1.0).unwrap().run(|| ()));
    assert!(stepper
        .step("p", "some", 2.0)
        .unwrap()
        .run(|| (true, Some("cached"))));
    assert!(!stepper
        .step("p", "none", 3.0)
        .unwrap()
        .run(|| (false, None::<String>)));

    let messages = stepper.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message, "cached");
    assert_eq!(messages[0].outcome, Outcome::Success);
}

#[test]
fn test_tagged_results() {
    let (stepper, _) = quiet_stepper();
    assert!(stepper
        .step("p", "ok", 1.0)
        .unwrap()
        .run(|| StepResult::SuccessWithMessage("done".into())));
    assert!(!stepper
        .step("p", "bad", 2.0)
        .unwrap()
        .run(|| StepResult::Failure("nope".into())));

    assert_eq!(stepper.failures()[0].message, "nope");
    let texts: Vec<_> = stepper.messages().into_iter().map(|m| m.message).collect();
    assert_eq!(texts, vec!["done", "nope"]);
}

#[test]
fn test_result_errors_become_failures() {
    let (stepper, _) = quiet_stepper();
    let ok = stepper
        .step("db", "connect", 1.0)
        .unwrap()
        .run(|| -> anyhow::Result<bool> { anyhow::bail!("Connection refused") });
    assert!(!ok);
    assert_eq!(stepper.failures()[0].message, "Connection refused");

    let ok = stepper
        .step("db", "query", 2.0)
        .unwrap()
        .run(|| Ok::<_, std::io::Error>((true, "3 rows")));
    assert!(ok);
}

#[test]
fn test_panic_is_captured() {
    let (stepper, _) = quiet_stepper();
    let ok = stepper
        .step("p", "explodes", 1.0)
        .unwrap()
        .run(|| -> bool { panic!("boom") });

    assert!(!ok);
    let failures = stepper.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "boom");

    // the workflow carries on
    assert!(pass(&stepper, "p", "after", 2.0));
}

#[test]
fn test_current_task_only_while_running() {
    let (stepper, _) = quiet_stepper();
    let observer = stepper.clone();
    let step = stepper.step("p", "watched", 1.0).unwrap();

    let ok = step.run(move || {
        let snapshot = observer.snapshot();
        let current = snapshot.current.expect("a task is current");
        let task = snapshot.tasks().find(|t| t.id == current).unwrap();
        task.name == "watched" && task.state == TaskState::Running
    });

    assert!(ok);
    assert_eq!(stepper.snapshot().current, None);
}

#[test]
fn test_rerun_keeps_first_failure_only() {
    let (stepper, _) = quiet_stepper();
    let step = stepper.step("p", "flaky", 1.0).unwrap();
    assert!(!step.run(|| (false, "first")));
    assert!(!step.run(|| (false, "second")));
    assert!(step.run(|| true));

    let failures = stepper.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message, "first");

    let snapshot = stepper.snapshot();
    let task = snapshot.tasks().next().unwrap();
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.outcome, Some(Outcome::Success));
}

#[test]
fn test_elapsed_is_recorded() {
    let (stepper, _) = quiet_stepper();
    stepper
        .step("p", "sleepy", 1.0)
        .unwrap()
        .run(|| std::thread::sleep(std::time::Duration::from_millis(15)));

    let snapshot = stepper.snapshot();
    let elapsed = snapshot.tasks().next().unwrap().elapsed.unwrap();
    assert!(elapsed >= std::time::Duration::from_millis(15));
}

#[test]
fn test_clones_share_one_workflow() {
    let (stepper, _) = quiet_stepper();
    let other = stepper.clone();
    pass(&other, "p", "from clone", 1.0);
    assert_eq!(stepper.snapshot().task_count(), 1);
}

#[tokio::test]
async fn test_async_step() {
    let (stepper, _) = quiet_stepper();
    let step = stepper.step("io", "fetch", 1.0).unwrap();
    let ok = step
        .run_async(async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok::<_, std::io::Error>((true, "fetched"))
        })
        .await;

    assert!(ok);
    assert_eq!(stepper.messages()[0].message, "fetched");
}

#[test]
fn test_outcome_after_reset_inside_work_is_dropped() {
    let (stepper, _) = quiet_stepper();
    let inner = stepper.clone();

    let ok = stepper.step("old", "outer", 1.0).unwrap().run(move || {
        inner.reset();
        pass(&inner, "new", "inner", 1.0);
        (false, "late")
    });

    assert!(!ok);
    assert_eq!(stepper.phases(), vec!["new"]);
    let snapshot = stepper.snapshot();
    let task = snapshot.tasks().next().unwrap();
    assert_eq!(task.name, "inner");
    assert_eq!(task.outcome, Some(Outcome::Success));
    assert!(stepper.failures().is_empty());
}
