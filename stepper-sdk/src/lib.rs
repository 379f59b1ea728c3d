// Re-export the attribute macro
pub use stepper_macros::step;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single task descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
}

impl TaskState {
    /// Whether moving to `next` keeps the Pending -> Running -> Completed order
    pub fn can_advance_to(self, next: TaskState) -> bool {
        self.rank() <= next.rank()
    }

    fn rank(self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::Running => 1,
            TaskState::Completed => 2,
        }
    }
}

/// Final outcome of a completed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn from_success(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Workflow status as seen by the stepper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    NotStarted,
    Running,
    /// The summary is being produced
    Completed,
}

/// What a unit of work reports back to the stepper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum StepResult {
    Success,
    SuccessWithMessage(String),
    Failure(String),
}

impl StepResult {
    /// Failure with no message attached
    pub fn failed() -> Self {
        StepResult::Failure(String::new())
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, StepResult::Failure(_))
    }

    /// Message text, empty when none was given
    pub fn message(&self) -> &str {
        match self {
            StepResult::Success => "",
            StepResult::SuccessWithMessage(msg) | StepResult::Failure(msg) => msg,
        }
    }

    /// Split into the (success, message) pair recorded on the descriptor
    pub fn into_parts(self) -> (bool, String) {
        match self {
            StepResult::Success => (true, String::new()),
            StepResult::SuccessWithMessage(msg) => (true, msg),
            StepResult::Failure(msg) => (false, msg),
        }
    }

    fn from_pair(success: bool, message: String) -> Self {
        match (success, message.is_empty()) {
            (true, true) => StepResult::Success,
            (true, false) => StepResult::SuccessWithMessage(message),
            (false, _) => StepResult::Failure(message),
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Success => write!(f, "success"),
            StepResult::SuccessWithMessage(msg) => write!(f, "success: {}", msg),
            StepResult::Failure(msg) if msg.is_empty() => write!(f, "failure"),
            StepResult::Failure(msg) => write!(f, "failure: {}", msg),
        }
    }
}

/// Conversion from whatever a unit of work returns into a [`StepResult`]
///
/// Implemented for the shapes tasks commonly produce:
/// - `bool`
/// - `(bool, &str)`, `(bool, String)` and their `Option` variants
/// - `()` (a task that can only fail by erroring or panicking)
/// - `StepResult` itself
/// - `Result<T, E>` where `T: IntoStepResult` and `E: Display`
pub trait IntoStepResult {
    fn into_step_result(self) -> StepResult;
}

impl IntoStepResult for StepResult {
    fn into_step_result(self) -> StepResult {
        self
    }
}

impl IntoStepResult for bool {
    fn into_step_result(self) -> StepResult {
        StepResult::from_pair(self, String::new())
    }
}

impl IntoStepResult for () {
    fn into_step_result(self) -> StepResult {
        StepResult::Success
    }
}

impl IntoStepResult for (bool, String) {
    fn into_step_result(self) -> StepResult {
        StepResult::from_pair(self.0, self.1)
    }
}

impl IntoStepResult for (bool, &str) {
    fn into_step_result(self) -> StepResult {
        StepResult::from_pair(self.0, self.1.to_string())
    }
}

impl IntoStepResult for (bool, Option<String>) {
    fn into_step_result(self) -> StepResult {
        StepResult::from_pair(self.0, self.1.unwrap_or_default())
    }
}

impl IntoStepResult for (bool, Option<&str>) {
    fn into_step_result(self) -> StepResult {
        StepResult::from_pair(self.0, self.1.map(str::to_string).unwrap_or_default())
    }
}

impl<T, E> IntoStepResult for Result<T, E>
where
    T: IntoStepResult,
    E: fmt::Display,
{
    fn into_step_result(self) -> StepResult {
        match self {
            Ok(value) => value.into_step_result(),
            Err(err) => StepResult::Failure(err.to_string()),
        }
    }
}

/// Structured events published while a workflow runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    /// Task descriptor created
    TaskRegistered {
        phase: String,
        task: String,
        order: f64,
    },
    /// Task began executing
    TaskStarted { phase: String, task: String },
    /// Task finished successfully
    TaskCompleted {
        phase: String,
        task: String,
        message: Option<String>,
    },
    /// Task finished with a failure
    TaskFailed {
        phase: String,
        task: String,
        message: String,
    },
    /// All registry state was cleared
    WorkflowReset,
    /// Summary was produced
    SummaryReady { total: usize, failed: usize },
}

impl StepEvent {
    /// Serialize as a single JSON line
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
