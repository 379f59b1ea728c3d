//! Live display driven by the background refresher

use super::common::*;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(mut ready: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if ready() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_final_frame_shows_every_result() {
    let (stepper, surface) = live_stepper();
    pass(&stepper, "setup", "third", 3.0);
    fail(&stepper, "setup", "first", 1.0, "X");
    pass(&stepper, "setup", "second", 2.0);
    assert!(stepper.is_refreshing());

    // each completion is painted before the wrapper returns
    assert_eq!(
        surface.last_frame().unwrap(),
        "SETUP\n  ✗ first: X\n  ✓ second\n  ✓ third\n"
    );

    stepper.summary();
    assert!(!stepper.is_refreshing());
    assert_eq!(
        surface.last_frame().unwrap(),
        "SETUP\n  ✗ first: X\n  ✓ second\n  ✓ third\n"
    );
    assert!(surface.settle_count() >= 1);
}

#[test]
fn test_live_summary_skips_board_reprint() {
    let (stepper, surface) = live_stepper();
    pass(&stepper, "setup", "only", 1.0);
    stepper.summary();

    assert_eq!(surface.emitted(), "✓ All 1 tasks completed successfully");
}

#[test]
fn test_frames_advance_while_idle() {
    let (stepper, surface) = live_stepper();
    pass(&stepper, "setup", "a", 1.0);

    let before = surface.frames().len();
    assert!(wait_for(|| surface.frames().len() > before + 2));
    stepper.summary();
}

#[test]
fn test_start_workflow_paints_declared_tasks() {
    let (stepper, surface) = live_stepper();
    let step = stepper.step("setup", "planned", 1.0).unwrap();
    stepper.declare(&step);
    assert!(!stepper.is_refreshing());

    stepper.start_workflow().unwrap();
    assert!(stepper.is_refreshing());
    assert!(wait_for(|| surface
        .last_frame()
        .is_some_and(|frame| frame == "SETUP\n  - planned\n")));

    stepper.reset();
    assert!(!stepper.is_refreshing());
}

#[test]
fn test_single_refresher_across_tasks() {
    let (stepper, _) = live_stepper();
    pass(&stepper, "p", "a", 1.0);
    pass(&stepper, "p", "b", 2.0);
    // a redundant start leaves the running refresher alone
    stepper.start_workflow().unwrap();
    assert!(stepper.is_refreshing());

    stepper.reset();
    assert!(!stepper.is_refreshing());
    stepper.reset();
}

#[test]
fn test_no_refresher_when_live_is_off() {
    let (stepper, surface) = quiet_stepper();
    pass(&stepper, "p", "a", 1.0);
    stepper.start_workflow().unwrap();

    assert!(!stepper.is_refreshing());
    assert!(surface.frames().is_empty());
}

#[test]
fn test_live_step_from_another_thread() {
    let (stepper, surface) = live_stepper();
    let worker = stepper.clone();
    let handle = thread::spawn(move || pass(&worker, "bg", "remote", 1.0));
    assert!(handle.join().unwrap());

    stepper.summary();
    assert_eq!(surface.last_frame().unwrap(), "BG\n  ✓ remote\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_step_waits_for_paint() {
    let (stepper, surface) = live_stepper();
    let step = stepper.step("io", "download", 1.0).unwrap();
    assert!(step.run_async(async { true }).await);

    assert_eq!(surface.last_frame().unwrap(), "IO\n  ✓ download\n");
    stepper.summary();
}
