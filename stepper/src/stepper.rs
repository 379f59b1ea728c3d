//! The stepper handle
//!
//! [`Stepper`] is a cheap-to-clone handle over one workflow's shared state:
//! the registry (behind a mutex), the output surface, the refresher thread
//! and the event channel. Tasks run on the caller's thread; only the
//! refresher runs in the background.

use chrono::{DateTime, Local};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use stepper_sdk::{IntoStepResult, StepEvent, StepResult, WorkflowState};
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::config::StepperConfig;
use crate::error::{Result, StepperError};
use crate::refresher::{self, PaintSignal};
use crate::registry::{FailureEntry, Identity, MessageEntry, Registry, Snapshot, TaskId};
use crate::render::{render_board, View};
use crate::step::Step;
use crate::summary::{render_summary, Summary};
use crate::surface::{Surface, TerminalSurface};

const EVENT_CAPACITY: usize = 256;

/// Identifies one run between resets
#[derive(Debug, Clone)]
struct RunInfo {
    id: Uuid,
    started_at: Option<DateTime<Local>>,
}

impl RunInfo {
    fn fresh() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: None,
        }
    }
}

/// State shared between the caller's handles and the refresher thread
pub(crate) struct Shared {
    pub(crate) config: StepperConfig,
    pub(crate) signal: Arc<PaintSignal>,
    live: bool,
    registry: Mutex<Registry>,
    surface: Mutex<Box<dyn Surface>>,
    refresher: Mutex<Option<JoinHandle<()>>>,
    /// Whether the live region was drawn during the current run
    painted_live: AtomicBool,
    run: Mutex<RunInfo>,
    events: broadcast::Sender<StepEvent>,
}

impl Shared {
    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn surface(&self) -> MutexGuard<'_, Box<dyn Surface>> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        self.registry().snapshot()
    }

    fn run_info(&self) -> MutexGuard<'_, RunInfo> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // The refresher may be the thread running this drop, so it is
        // told to stop but never joined here.
        self.signal.stop();
        let surface = self
            .surface
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = surface.settle() {
            trace!(error = %err, "settle on drop failed");
        }
    }
}

/// Tracks tasks grouped by phase and shows them live on a terminal
#[derive(Clone)]
pub struct Stepper {
    shared: Arc<Shared>,
}

impl Stepper {
    /// Default configuration, drawing to stdout
    pub fn new() -> Self {
        Self::build(StepperConfig::default(), None)
    }

    /// Validated configuration, drawing to stdout
    pub fn with_config(config: StepperConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    /// Draw to a custom surface.
    ///
    /// `live: auto` counts as enabled here since there is no terminal to probe.
    pub fn with_surface(config: StepperConfig, surface: impl Surface + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, Some(Box::new(surface))))
    }

    fn build(config: StepperConfig, surface: Option<Box<dyn Surface>>) -> Self {
        let (live, surface) = match surface {
            Some(surface) => (config.live.resolve(true), surface),
            None => (
                config.live_enabled(),
                Box::new(TerminalSurface::stdout(config.color_enabled())) as Box<dyn Surface>,
            ),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                config,
                signal: Arc::new(PaintSignal::default()),
                live,
                registry: Mutex::new(Registry::new()),
                surface: Mutex::new(surface),
                refresher: Mutex::new(None),
                painted_live: AtomicBool::new(false),
                run: Mutex::new(RunInfo::fresh()),
                events,
            }),
        }
    }

    pub fn config(&self) -> &StepperConfig {
        &self.shared.config
    }

    /// Describe a task. Nothing is registered until it runs or is declared.
    ///
    /// Each call yields a distinct identity: two `Step`s with equal metadata
    /// are tracked separately. Clone a `Step` to reuse one identity.
    pub fn step(&self, phase: impl Into<String>, task: impl Into<String>, order: f64) -> Result<Step> {
        Step::new(self.clone(), phase.into(), task.into(), order, Identity::fresh())
    }

    /// Like [`Stepper::step`] with a caller-chosen stable identity
    pub fn step_with_identity(
        &self,
        phase: impl Into<String>,
        task: impl Into<String>,
        order: f64,
        identity: Identity,
    ) -> Result<Step> {
        Step::new(self.clone(), phase.into(), task.into(), order, identity)
    }

    /// Register a task as pending so it shows before it runs.
    ///
    /// Declaring into an idle workflow starts a fresh run.
    pub fn declare(&self, step: &Step) {
        self.begin_if_idle();
        let created = self.register(step).1;
        if created && self.is_refreshing() {
            self.shared.signal.request();
        }
    }

    /// Mark the workflow running and start the live display if tasks exist
    pub fn start_workflow(&self) -> Result<()> {
        self.begin_if_idle();
        if !self.shared.registry().is_empty() {
            self.ensure_refresher()?;
        }
        Ok(())
    }

    /// Stop the live display and clear every task, phase and log entry
    pub fn reset(&self) {
        self.stop_refresher();
        self.shared.registry().clear();
        *self.shared.run_info() = RunInfo::fresh();
        self.shared.painted_live.store(false, Ordering::SeqCst);
        debug!("stepper reset");
        self.publish(StepEvent::WorkflowReset);
    }

    /// Stop the live display, print the report and return the workflow to idle.
    ///
    /// When no live display ran, the final board is printed ahead of the report.
    pub fn summary(&self) -> Summary {
        self.stop_refresher();
        let painted_live = self.shared.painted_live.swap(false, Ordering::SeqCst);

        let (run_id, started_at) = {
            let run = self.shared.run_info();
            (run.id, run.started_at)
        };

        let (summary, board) = {
            let mut registry = self.shared.registry();
            registry.set_workflow_state(WorkflowState::Completed);
            let board = (!painted_live)
                .then(|| render_board(&registry.snapshot(), 0, &self.shared.config.spinner));
            (Summary::collect(&registry, run_id, started_at), board)
        };

        let mut view = board.unwrap_or_default();
        view.extend(render_summary(&summary));
        if let Err(err) = self.shared.surface().emit(&view) {
            warn!(error = %err, "failed to print summary");
        }

        self.shared
            .registry()
            .set_workflow_state(WorkflowState::NotStarted);

        debug!(
            total = summary.total,
            failed = summary.failed,
            "workflow summary produced"
        );
        self.publish(StepEvent::SummaryReady {
            total: summary.total,
            failed: summary.failed,
        });
        summary
    }

    /// Copy of the current board state
    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot()
    }

    /// Current board rendered with the first spinner frame
    pub fn render(&self) -> View {
        render_board(&self.snapshot(), 0, &self.shared.config.spinner)
    }

    pub fn workflow_state(&self) -> WorkflowState {
        self.shared.registry().workflow_state()
    }

    pub fn failures(&self) -> Vec<FailureEntry> {
        self.shared.registry().failures().to_vec()
    }

    pub fn messages(&self) -> Vec<MessageEntry> {
        self.shared.registry().messages().to_vec()
    }

    /// Phase names in first-seen order
    pub fn phases(&self) -> Vec<String> {
        self.shared.registry().phase_order().to_vec()
    }

    pub fn run_id(&self) -> Uuid {
        self.shared.run_info().id
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher_slot().is_some()
    }

    /// Receive task events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StepEvent> {
        self.shared.events.subscribe()
    }

    /// Entry point for `#[step]` functions
    #[doc(hidden)]
    pub fn run_named<F, R>(&self, phase: &str, task: &str, order: f64, path: &'static str, work: F) -> bool
    where
        F: FnOnce() -> R,
        R: IntoStepResult,
    {
        match self.step_with_identity(phase, task, order, Identity::named(path)) {
            Ok(step) => step.run(work),
            Err(err) => {
                error!(error = %err, task, "invalid step, work not run");
                false
            }
        }
    }

    /// Entry point for async `#[step]` functions
    #[doc(hidden)]
    pub async fn run_named_async<Fut, R>(
        &self,
        phase: &str,
        task: &str,
        order: f64,
        path: &'static str,
        work: Fut,
    ) -> bool
    where
        Fut: Future<Output = R>,
        R: IntoStepResult,
    {
        match self.step_with_identity(phase, task, order, Identity::named(path)) {
            Ok(step) => step.run_async(work).await,
            Err(err) => {
                error!(error = %err, task, "invalid step, work not run");
                false
            }
        }
    }

    // Invocation plumbing used by `Step`

    /// Start a run, register the task, mark it running and current
    pub(crate) fn begin_task(&self, step: &Step) -> TaskId {
        self.begin_if_idle();
        let (id, _) = self.register(step);

        if let Err(err) = self.ensure_refresher() {
            warn!(error = %err, "live display unavailable");
        }

        {
            let mut registry = self.shared.registry();
            if let Some(running) = registry.get(id).map(|task| task.running()) {
                registry.update(id, running);
            }
            registry.set_current(Some(id));
        }
        if self.is_refreshing() {
            self.shared.signal.request();
        }

        trace!(phase = step.phase(), task = step.name(), "task started");
        self.publish(StepEvent::TaskStarted {
            phase: step.phase().to_string(),
            task: step.name().to_string(),
        });
        id
    }

    /// Record the outcome and clear the current marker.
    ///
    /// Returns the success flag and the generation to wait on.
    pub(crate) fn complete_task(&self, id: TaskId, result: StepResult, elapsed: Duration) -> (bool, u64) {
        let (success, message) = result.into_parts();

        let (phase, task, generation) = {
            let mut registry = self.shared.registry();
            let Some(done) = registry
                .get(id)
                .map(|task| task.completed(success, message.clone(), elapsed))
            else {
                // registry was reset while the task ran
                return (success, registry.generation());
            };
            let (phase, task) = (done.phase.clone(), done.name.clone());
            registry.update(id, done);
            if !success {
                registry.record_failure(id);
            }
            registry.record_message(id);
            registry.set_current(None);
            (phase, task, registry.generation())
        };

        if success {
            debug!(%phase, %task, elapsed_ms = elapsed.as_millis() as u64, "task succeeded");
            self.publish(StepEvent::TaskCompleted {
                phase,
                task,
                message: (!message.is_empty()).then_some(message),
            });
        } else {
            debug!(%phase, %task, %message, "task failed");
            self.publish(StepEvent::TaskFailed { phase, task, message });
        }

        (success, generation)
    }

    /// Wait (bounded) until the refresher has painted `generation`
    pub(crate) fn await_paint(&self, generation: u64) {
        if !self.is_refreshing() {
            return;
        }
        self.shared.signal.request();
        let timeout = self.shared.config.paint_timeout();
        if !self.shared.signal.wait_painted(generation, timeout) {
            trace!(generation, "paint acknowledgment timed out");
        }
    }

    fn begin_if_idle(&self) {
        if self.shared.registry().workflow_state() == WorkflowState::Running {
            return;
        }
        self.reset();
        self.shared
            .registry()
            .set_workflow_state(WorkflowState::Running);
        self.shared.run_info().started_at = Some(Local::now());
        debug!("workflow started");
    }

    fn register(&self, step: &Step) -> (TaskId, bool) {
        let (id, created) = self.shared.registry().register_if_absent(
            step.phase(),
            step.name(),
            step.order(),
            step.identity(),
        );
        if created {
            debug!(phase = step.phase(), task = step.name(), order = step.order(), "task registered");
            self.publish(StepEvent::TaskRegistered {
                phase: step.phase().to_string(),
                task: step.name().to_string(),
                order: step.order(),
            });
        }
        (id, created)
    }

    fn refresher_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.shared
            .refresher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the refresher unless one is running or live display is off
    fn ensure_refresher(&self) -> Result<bool> {
        if !self.shared.live {
            return Ok(false);
        }
        let mut slot = self.refresher_slot();
        if slot.is_some() {
            return Ok(false);
        }

        self.shared.signal.rearm();
        let handle = refresher::spawn(Arc::downgrade(&self.shared))
            .map_err(StepperError::RefresherSpawn)?;
        *slot = Some(handle);
        self.shared.painted_live.store(true, Ordering::SeqCst);
        debug!("refresher started");
        Ok(true)
    }

    fn stop_refresher(&self) {
        let Some(handle) = self.refresher_slot().take() else {
            return;
        };
        self.shared.signal.stop();
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            warn!("refresher thread panicked");
        }
        if let Err(err) = self.shared.surface().settle() {
            warn!(error = %err, "failed to end live display");
        }
        debug!("refresher stopped");
    }

    fn publish(&self, event: StepEvent) {
        // no subscribers is fine
        let _ = self.shared.events.send(event);
    }
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Stepper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stepper")
            .field("config", &self.shared.config)
            .field("live", &self.shared.live)
            .field("workflow", &self.workflow_state())
            .finish()
    }
}
