//! Step wrapper
//!
//! A [`Step`] carries a task's phase, name, order and identity. Running work
//! through it registers the task, tracks its state, and folds every way the
//! work can end (value, error, panic, timeout) into a boolean success.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use stepper_sdk::{IntoStepResult, StepResult};

use crate::error::{Result, StepperError};
use crate::registry::Identity;
use crate::stepper::Stepper;

/// Metadata for one task plus the stepper it reports to
#[derive(Clone)]
pub struct Step {
    stepper: Stepper,
    phase: String,
    name: String,
    order: f64,
    identity: Identity,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("phase", &self.phase)
            .field("name", &self.name)
            .field("order", &self.order)
            .field("identity", &self.identity)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Step {
    pub(crate) fn new(
        stepper: Stepper,
        phase: String,
        name: String,
        order: f64,
        identity: Identity,
    ) -> Result<Self> {
        if phase.trim().is_empty() {
            return Err(StepperError::EmptyLabel { field: "phase" });
        }
        if name.trim().is_empty() {
            return Err(StepperError::EmptyLabel { field: "task" });
        }
        if !order.is_finite() {
            return Err(StepperError::InvalidOrder(order));
        }
        Ok(Self {
            stepper,
            phase,
            name,
            order,
            identity,
            timeout: None,
        })
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> f64 {
        self.order
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Fail async work that runs longer than `limit`.
    ///
    /// Only [`Step::run_async`] can enforce this; synchronous work cannot be
    /// interrupted.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Run `work` once as this task and return whether it succeeded.
    ///
    /// Panics inside `work` are caught and recorded as failures.
    pub fn run<F, R>(&self, work: F) -> bool
    where
        F: FnOnce() -> R,
        R: IntoStepResult,
    {
        let id = self.stepper.begin_task(self);
        let started = Instant::now();

        let result = normalize(catch_unwind(AssertUnwindSafe(work)));

        let (success, generation) = self.stepper.complete_task(id, result, started.elapsed());
        self.stepper.await_paint(generation);
        success
    }

    /// Async counterpart of [`Step::run`]; must be awaited inside a tokio runtime.
    pub async fn run_async<Fut, R>(&self, work: Fut) -> bool
    where
        Fut: Future<Output = R>,
        R: IntoStepResult,
    {
        let id = self.stepper.begin_task(self);
        let started = Instant::now();

        let guarded = AssertUnwindSafe(work).catch_unwind();
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => normalize(outcome),
                Err(_) => StepResult::Failure(format!("timed out after {:?}", limit)),
            },
            None => normalize(guarded.await),
        };

        let (success, generation) = self.stepper.complete_task(id, result, started.elapsed());
        if self.stepper.is_refreshing() {
            let stepper = self.stepper.clone();
            // the acknowledgment wait blocks, keep it off the async workers
            let _ = tokio::task::spawn_blocking(move || stepper.await_paint(generation)).await;
        }
        success
    }

    /// Bind reusable work to this step; every `call()` is one invocation
    pub fn wrap<F, R>(self, work: F) -> Wrapped<F>
    where
        F: FnMut() -> R,
        R: IntoStepResult,
    {
        Wrapped { step: self, work }
    }
}

/// Work bound to a [`Step`]
pub struct Wrapped<F> {
    step: Step,
    work: F,
}

impl<F, R> Wrapped<F>
where
    F: FnMut() -> R,
    R: IntoStepResult,
{
    pub fn call(&mut self) -> bool {
        self.step.run(&mut self.work)
    }

    pub fn step(&self) -> &Step {
        &self.step
    }
}

fn normalize<R: IntoStepResult>(outcome: std::thread::Result<R>) -> StepResult {
    match outcome {
        Ok(value) => value.into_step_result(),
        Err(payload) => StepResult::Failure(panic_message(payload.as_ref())),
    }
}

/// Text of a panic payload (`panic!("...")` produces `&str` or `String`)
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}
