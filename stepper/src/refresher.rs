//! Background repaint loop
//!
//! The refresher thread owns nothing but its frame counter. Each tick it
//! copies a registry snapshot under the lock, renders outside it, repaints
//! the surface and acknowledges the generation it painted. Finished tasks
//! wait on that acknowledgment instead of sleeping.

use std::io;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{trace, warn};

use crate::render::render_board;
use crate::stepper::Shared;

#[derive(Debug, Default)]
struct PaintState {
    /// Highest registry generation shown on the surface
    painted: u64,
    /// A repaint was requested before the next tick
    dirty: bool,
    stop: bool,
}

/// Handshake between task completion and the refresher
#[derive(Debug, Default)]
pub(crate) struct PaintSignal {
    state: Mutex<PaintState>,
    cond: Condvar,
}

impl PaintSignal {
    fn lock(&self) -> MutexGuard<'_, PaintState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear a previous stop so a new refresher can run
    pub(crate) fn rearm(&self) {
        let mut state = self.lock();
        state.stop = false;
        state.dirty = false;
    }

    pub(crate) fn stop(&self) {
        self.lock().stop = true;
        self.cond.notify_all();
    }

    /// Ask for a repaint without waiting for the next tick
    pub(crate) fn request(&self) {
        self.lock().dirty = true;
        self.cond.notify_all();
    }

    pub(crate) fn acknowledge(&self, generation: u64) {
        let mut state = self.lock();
        state.painted = state.painted.max(generation);
        drop(state);
        self.cond.notify_all();
    }

    /// Block until `generation` is painted, the refresher stops, or `timeout`.
    ///
    /// Returns whether the generation was painted.
    pub(crate) fn wait_painted(&self, generation: u64, timeout: Duration) -> bool {
        let guard = self.lock();
        let (state, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |s| s.painted < generation && !s.stop)
            .unwrap_or_else(PoisonError::into_inner);
        state.painted >= generation
    }

    /// Sleep for one tick or until a repaint/stop is requested.
    ///
    /// Returns true once a stop was requested.
    fn wait_tick(&self, interval: Duration) -> bool {
        let guard = self.lock();
        let (mut state, _) = self
            .cond
            .wait_timeout_while(guard, interval, |s| !s.dirty && !s.stop)
            .unwrap_or_else(PoisonError::into_inner);
        state.dirty = false;
        state.stop
    }

    fn stop_requested(&self) -> bool {
        self.lock().stop
    }
}

/// Start the refresher thread.
///
/// The thread holds only a weak reference, so dropping the last `Stepper`
/// ends it at the next tick.
pub(crate) fn spawn(shared: Weak<Shared>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stepper-refresher".to_string())
        .spawn(move || run(shared))
}

fn run(shared: Weak<Shared>) {
    let mut frame: usize = 0;

    loop {
        let Some(shared) = shared.upgrade() else {
            trace!("stepper dropped, refresher exiting");
            break;
        };

        let snapshot = shared.snapshot();
        let view = render_board(&snapshot, frame, &shared.config.spinner);
        if let Err(err) = shared.surface().repaint(&view) {
            warn!(error = %err, "live repaint failed");
        }
        shared.signal.acknowledge(snapshot.generation);

        // A stop is honoured only after the frame above, so the final
        // state is always on screen when the thread exits.
        if shared.signal.stop_requested() {
            break;
        }

        let interval = shared.config.refresh_interval();
        let signal = shared.signal.clone();
        drop(shared);

        // a stop during the wait still gets one more frame above
        signal.wait_tick(interval);
        frame = frame.wrapping_add(1);
    }
}
