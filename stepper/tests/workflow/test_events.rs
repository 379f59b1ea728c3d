//! Events published over the broadcast channel

use super::common::*;
use stepper::StepEvent;

fn drain(rx: &mut tokio::sync::broadcast::Receiver<StepEvent>) -> Vec<StepEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_event_sequence_for_a_run() {
    let (stepper, _) = quiet_stepper();
    let mut rx = stepper.subscribe();

    pass(&stepper, "setup", "a", 1.0);
    fail(&stepper, "setup", "b", 2.0, "bad");
    stepper.summary();

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            StepEvent::WorkflowReset,
            StepEvent::TaskRegistered {
                phase: "setup".into(),
                task: "a".into(),
                order: 1.0
            },
            StepEvent::TaskStarted {
                phase: "setup".into(),
                task: "a".into()
            },
            StepEvent::TaskCompleted {
                phase: "setup".into(),
                task: "a".into(),
                message: None
            },
            StepEvent::TaskRegistered {
                phase: "setup".into(),
                task: "b".into(),
                order: 2.0
            },
            StepEvent::TaskStarted {
                phase: "setup".into(),
                task: "b".into()
            },
            StepEvent::TaskFailed {
                phase: "setup".into(),
                task: "b".into(),
                message: "bad".into()
            },
            StepEvent::SummaryReady { total: 2, failed: 1 },
        ]
    );
}

#[test]
fn test_events_serialize_as_tagged_json() {
    let (stepper, _) = quiet_stepper();
    let mut rx = stepper.subscribe();
    stepper.reset();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.to_json().unwrap(), r#"{"type":"workflow_reset"}"#);
}
