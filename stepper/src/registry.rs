//! Task registry: descriptors grouped by phase, first-seen phase order,
//! the current-task marker and the failure/message logs.
//!
//! The registry itself is plain data. [`crate::Stepper`] keeps it behind a
//! mutex and hands immutable [`Snapshot`]s to the renderer.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use stepper_sdk::{Outcome, TaskState, WorkflowState};

static NEXT_ANONYMOUS: AtomicU64 = AtomicU64::new(1);

/// Distinguishes registrations whose phase, name and order are identical.
///
/// Steps built at runtime get a fresh anonymous identity; `#[step]`
/// functions use their module path, which is stable across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity(IdentityKind);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IdentityKind {
    Anonymous(u64),
    Named(&'static str),
}

impl Identity {
    pub fn fresh() -> Self {
        Identity(IdentityKind::Anonymous(
            NEXT_ANONYMOUS.fetch_add(1, Ordering::Relaxed),
        ))
    }

    pub fn named(path: &'static str) -> Self {
        Identity(IdentityKind::Named(path))
    }
}

/// Position of a descriptor within one run, assigned at first registration.
///
/// Ids from before a [`Registry::clear`] no longer resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    epoch: u64,
    slot: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TaskKey {
    phase: String,
    name: String,
    order_bits: u64,
    identity: Identity,
}

impl TaskKey {
    fn new(phase: &str, name: &str, order: f64, identity: Identity) -> Self {
        // -0.0 and 0.0 compare equal, so they must hash the same
        let order = if order == 0.0 { 0.0 } else { order };
        Self {
            phase: phase.to_string(),
            name: name.to_string(),
            order_bits: order.to_bits(),
            identity,
        }
    }
}

/// Tracked state of one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub phase: String,
    pub name: String,
    pub order: f64,
    pub identity: Identity,
    pub state: TaskState,
    pub outcome: Option<Outcome>,
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl TaskDescriptor {
    fn pending(id: TaskId, phase: &str, name: &str, order: f64, identity: Identity) -> Self {
        Self {
            id,
            phase: phase.to_string(),
            name: name.to_string(),
            order,
            identity,
            state: TaskState::Pending,
            outcome: None,
            message: String::new(),
            elapsed: None,
        }
    }

    /// Copy moved to Running; a completed task keeps its state
    pub fn running(&self) -> Self {
        let mut next = self.clone();
        if next.state.can_advance_to(TaskState::Running) {
            next.state = TaskState::Running;
        }
        next
    }

    /// Copy moved to Completed with the given outcome
    pub fn completed(&self, success: bool, message: String, elapsed: Duration) -> Self {
        Self {
            state: TaskState::Completed,
            outcome: Some(Outcome::from_success(success)),
            message,
            elapsed: Some(elapsed),
            ..self.clone()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == Some(Outcome::Success)
    }

    pub fn failed(&self) -> bool {
        self.outcome == Some(Outcome::Failure)
    }
}

/// Entry in the failure log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub phase: String,
    pub task: String,
    pub message: String,
}

/// Entry in the all-messages log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageEntry {
    pub phase: String,
    pub task: String,
    pub outcome: Outcome,
    pub message: String,
}

/// Tasks of one phase, ascending by order
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSnapshot {
    pub name: String,
    pub tasks: Vec<TaskDescriptor>,
}

/// Immutable copy of the registry taken under the lock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub phases: Vec<PhaseSnapshot>,
    pub current: Option<TaskId>,
    pub generation: u64,
}

impl Snapshot {
    pub fn task_count(&self) -> usize {
        self.phases.iter().map(|p| p.tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.task_count() == 0
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.phases.iter().flat_map(|p| p.tasks.iter())
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseSnapshot> {
        self.phases.iter().find(|p| p.name == name)
    }
}

#[derive(Debug)]
pub struct Registry {
    tasks: Vec<TaskDescriptor>,
    index: HashMap<TaskKey, TaskId>,
    phases: HashMap<String, Vec<TaskId>>,
    phase_order: Vec<String>,
    current: Option<TaskId>,
    failures: Vec<FailureEntry>,
    /// Task of each failure log entry, same order as `failures`
    failure_ids: Vec<TaskId>,
    failed_ids: HashSet<TaskId>,
    messages: Vec<MessageEntry>,
    workflow: WorkflowState,
    /// Bumped on every visible change; never reset
    generation: u64,
    /// Bumped by `clear`
    epoch: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            index: HashMap::new(),
            phases: HashMap::new(),
            phase_order: Vec::new(),
            current: None,
            failures: Vec::new(),
            failure_ids: Vec::new(),
            failed_ids: HashSet::new(),
            messages: Vec::new(),
            workflow: WorkflowState::NotStarted,
            generation: 0,
            epoch: 0,
        }
    }

    /// Append `phase` to the phase order if it has not been seen this run
    pub fn note_phase(&mut self, phase: &str) -> bool {
        if self.phases.contains_key(phase) {
            return false;
        }
        self.phases.insert(phase.to_string(), Vec::new());
        self.phase_order.push(phase.to_string());
        self.generation += 1;
        true
    }

    /// Find the descriptor registered under exactly these values
    pub fn lookup(&self, phase: &str, name: &str, order: f64, identity: Identity) -> Option<TaskId> {
        self.index
            .get(&TaskKey::new(phase, name, order, identity))
            .copied()
    }

    /// Insert a Pending descriptor unless an identical one exists.
    ///
    /// Returns the id and whether a new descriptor was created.
    pub fn register_if_absent(
        &mut self,
        phase: &str,
        name: &str,
        order: f64,
        identity: Identity,
    ) -> (TaskId, bool) {
        if let Some(id) = self.lookup(phase, name, order, identity) {
            return (id, false);
        }

        self.note_phase(phase);

        let id = TaskId {
            epoch: self.epoch,
            slot: self.tasks.len(),
        };
        self.tasks
            .push(TaskDescriptor::pending(id, phase, name, order, identity));
        self.index
            .insert(TaskKey::new(phase, name, order, identity), id);
        self.phases.entry(phase.to_string()).or_default().push(id);
        self.generation += 1;
        (id, true)
    }

    /// Descriptor for `id`, or `None` when the id is from an earlier run
    pub fn get(&self, id: TaskId) -> Option<&TaskDescriptor> {
        if id.epoch != self.epoch {
            return None;
        }
        self.tasks.get(id.slot)
    }

    /// Replace a descriptor wholesale.
    ///
    /// Identity fields (id, phase, name, order) are kept from the stored copy;
    /// a write that would move the state backwards is ignored.
    pub fn update(&mut self, id: TaskId, descriptor: TaskDescriptor) -> bool {
        if id.epoch != self.epoch {
            return false;
        }
        let Some(slot) = self.tasks.get_mut(id.slot) else {
            return false;
        };
        if !slot.state.can_advance_to(descriptor.state) {
            return false;
        }
        let mut next = descriptor;
        next.id = slot.id;
        next.phase = slot.phase.clone();
        next.name = slot.name.clone();
        next.order = slot.order;
        next.identity = slot.identity;
        *slot = next;
        self.generation += 1;
        true
    }

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn set_current(&mut self, id: Option<TaskId>) {
        if self.current != id {
            self.current = id;
            self.generation += 1;
        }
    }

    /// Log a failure; each task appears at most once per run
    pub fn record_failure(&mut self, id: TaskId) -> bool {
        if id.epoch != self.epoch {
            return false;
        }
        let Some(task) = self.tasks.get(id.slot) else {
            return false;
        };
        if !self.failed_ids.insert(id) {
            return false;
        }
        self.failures.push(FailureEntry {
            phase: task.phase.clone(),
            task: task.name.clone(),
            message: task.message.clone(),
        });
        self.failure_ids.push(id);
        true
    }

    /// Log the task's message if it has one
    pub fn record_message(&mut self, id: TaskId) {
        if id.epoch != self.epoch {
            return;
        }
        let Some(task) = self.tasks.get(id.slot) else {
            return;
        };
        let (Some(outcome), false) = (task.outcome, task.message.is_empty()) else {
            return;
        };
        self.messages.push(MessageEntry {
            phase: task.phase.clone(),
            task: task.name.clone(),
            outcome,
            message: task.message.clone(),
        });
    }

    /// The full failure log, including tasks that later succeeded
    pub fn failures(&self) -> &[FailureEntry] {
        &self.failures
    }

    /// Failure log entries whose task still ends in failure
    pub fn outstanding_failures(&self) -> Vec<FailureEntry> {
        self.failures
            .iter()
            .zip(&self.failure_ids)
            .filter(|(_, id)| self.get(**id).is_some_and(TaskDescriptor::failed))
            .map(|(entry, _)| entry.clone())
            .collect()
    }

    pub fn messages(&self) -> &[MessageEntry] {
        &self.messages
    }

    pub fn phase_order(&self) -> &[String] {
        &self.phase_order
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn workflow_state(&self) -> WorkflowState {
        self.workflow
    }

    pub fn set_workflow_state(&mut self, state: WorkflowState) {
        self.workflow = state;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop every descriptor, phase, log entry and the current marker
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.index.clear();
        self.phases.clear();
        self.phase_order.clear();
        self.current = None;
        self.failures.clear();
        self.failure_ids.clear();
        self.failed_ids.clear();
        self.messages.clear();
        self.workflow = WorkflowState::NotStarted;
        self.generation += 1;
        self.epoch += 1;
    }

    /// Copy of the display-relevant state: phases in first-seen order,
    /// tasks ascending by order with ties in registration order
    pub fn snapshot(&self) -> Snapshot {
        let phases = self
            .phase_order
            .iter()
            .map(|phase| {
                let mut tasks: Vec<TaskDescriptor> = self
                    .phases
                    .get(phase)
                    .map(|ids| ids.iter().filter_map(|id| self.get(*id).cloned()).collect())
                    .unwrap_or_default();
                // sort_by is stable, so equal orders keep registration order
                tasks.sort_by(|a, b| a.order.total_cmp(&b.order));
                PhaseSnapshot {
                    name: phase.clone(),
                    tasks,
                }
            })
            .collect();

        Snapshot {
            phases,
            current: self.current,
            generation: self.generation,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
