//! Phase/task progress tracking with a live terminal board.
//!
//! Units of work run through a [`Step`] (or a `#[step]` function) are
//! registered under a phase, shown live while the workflow runs, and
//! summarized at the end with every failure and its message.

pub mod config;
pub mod error;
pub mod logging;
mod refresher;
pub mod registry;
pub mod render;
pub mod step;
pub mod stepper;
pub mod summary;
pub mod surface;

pub use config::{StepperConfig, Toggle};
pub use error::{Result, StepperError};
pub use registry::{FailureEntry, Identity, MessageEntry, Snapshot, TaskDescriptor, TaskId};
pub use render::View;
pub use step::{Step, Wrapped};
pub use stepper::Stepper;
pub use summary::Summary;
pub use surface::{MemorySurface, Surface, TerminalSurface};

pub use stepper_sdk::{
    step, IntoStepResult, Outcome, StepEvent, StepResult, TaskState, WorkflowState,
};
