//! Post-run report
//!
//! [`Summary`] aggregates the final registry state; [`render_summary`] turns it
//! into the aggregate line and the numbered failure list.

use chrono::{DateTime, Local};
use serde::Serialize;
use stepper_sdk::{Outcome, TaskState};
use uuid::Uuid;

use crate::registry::{FailureEntry, MessageEntry, Registry, TaskDescriptor};
use crate::render::{Line, Span, Tone, View, CHECK, CROSS};

/// Final state of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub order: f64,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl From<&TaskDescriptor> for TaskReport {
    fn from(task: &TaskDescriptor) -> Self {
        Self {
            name: task.name.clone(),
            order: task.order,
            state: task.state,
            outcome: task.outcome,
            message: (!task.message.is_empty()).then(|| task.message.clone()),
            elapsed_ms: task.elapsed.map(|d| d.as_millis() as u64),
        }
    }
}

/// Tasks of one phase, ascending by order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub name: String,
    pub tasks: Vec<TaskReport>,
}

/// Aggregated outcome of a workflow run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub run_id: Uuid,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: DateTime<Local>,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Registered but never finished
    pub pending: usize,
    pub phases: Vec<PhaseReport>,
    /// Failed tasks in the order they first failed; tasks that later
    /// succeeded are left out
    pub failures: Vec<FailureEntry>,
    pub messages: Vec<MessageEntry>,
}

impl Summary {
    /// Walk the registry in phase order and count outcomes
    pub fn collect(registry: &Registry, run_id: Uuid, started_at: Option<DateTime<Local>>) -> Self {
        let snapshot = registry.snapshot();

        let mut completed = 0;
        let mut succeeded = 0;
        let mut failed = 0;
        for task in snapshot.tasks() {
            if task.is_completed() {
                completed += 1;
            }
            if task.succeeded() {
                succeeded += 1;
            } else if task.failed() {
                failed += 1;
            }
        }
        let total = snapshot.task_count();

        let phases = snapshot
            .phases
            .iter()
            .map(|phase| PhaseReport {
                name: phase.name.clone(),
                tasks: phase.tasks.iter().map(TaskReport::from).collect(),
            })
            .collect();

        Self {
            run_id,
            started_at,
            finished_at: Local::now(),
            total,
            completed,
            succeeded,
            failed,
            pending: total - completed,
            phases,
            failures: registry.outstanding_failures(),
            messages: registry.messages().to_vec(),
        }
    }

    /// True when nothing failed (an empty run counts as successful)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Aggregate line followed by the numbered failure list
pub fn render_summary(summary: &Summary) -> View {
    let mut view = View::new();

    if summary.is_empty() {
        view.push(Line::new(vec![Span::new("No tasks were run.", Tone::Muted)]));
        return view;
    }

    let aggregate = if summary.failed > 0 {
        Span::new(
            format!("{} {} of {} tasks failed", CROSS, summary.failed, summary.total),
            Tone::Failure,
        )
    } else if summary.pending > 0 {
        Span::new(
            format!(
                "{} {} of {} tasks completed successfully ({} not run)",
                CHECK, summary.completed, summary.total, summary.pending
            ),
            Tone::Success,
        )
    } else {
        Span::new(
            format!("{} All {} tasks completed successfully", CHECK, summary.total),
            Tone::Success,
        )
    };
    view.push(Line::new(vec![aggregate]));

    if summary.failures.is_empty() {
        return view;
    }

    view.push(Line::blank());
    view.push(Line::new(vec![Span::new("FAILED TASKS", Tone::Failure)]));
    for (index, failure) in summary.failures.iter().enumerate() {
        let mut spans = vec![
            Span::new(format!("  {}. ", index + 1), Tone::Failure),
            Span::new(format!("[{}] ", failure.phase), Tone::Header),
            Span::new(failure.task.clone(), Tone::Emphasis),
        ];
        if !failure.message.is_empty() {
            spans.push(Span::new(format!(": {}", failure.message), Tone::Muted));
        }
        view.push(Line::new(spans));
    }

    view
}
