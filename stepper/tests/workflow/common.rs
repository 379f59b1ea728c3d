//! Common helpers for stepper integration tests

use std::time::Duration;
use stepper::{MemorySurface, Stepper, StepperConfig, Toggle};

/// Stepper without a live board; output lands in the returned surface
pub fn quiet_stepper() -> (Stepper, MemorySurface) {
    let surface = MemorySurface::new();
    let config = StepperConfig::default().with_live(Toggle::Never);
    let stepper = Stepper::with_surface(config, surface.clone()).unwrap();
    (stepper, surface)
}

/// Stepper with a fast live refresher and a generous paint timeout
pub fn live_stepper() -> (Stepper, MemorySurface) {
    let surface = MemorySurface::new();
    let config = StepperConfig::default()
        .with_live(Toggle::Always)
        .with_refresh_interval(Duration::from_millis(5))
        .with_paint_timeout(Duration::from_secs(2));
    let stepper = Stepper::with_surface(config, surface.clone()).unwrap();
    (stepper, surface)
}

/// Run a task that succeeds
pub fn pass(stepper: &Stepper, phase: &str, task: &str, order: f64) -> bool {
    stepper.step(phase, task, order).unwrap().run(|| true)
}

/// Run a task that fails with `message`
pub fn fail(stepper: &Stepper, phase: &str, task: &str, order: f64, message: &str) -> bool {
    let message = message.to_string();
    stepper
        .step(phase, task, order)
        .unwrap()
        .run(move || (false, message))
}

/// Task names of one phase in display order
pub fn task_names(stepper: &Stepper, phase: &str) -> Vec<String> {
    stepper
        .snapshot()
        .phase(phase)
        .map(|p| p.tasks.iter().map(|t| t.name.clone()).collect())
        .unwrap_or_default()
}
