/*!
 * Pressure Poller
 *
 * One-shot background sampler. A poller runs on its own thread, samples
 * every enabled resource once per interval and, the first time process
 * memory crosses its soft budget, hands a single `PressureEvent` to its sink
 * and exits. The coordinator spawns a fresh poller after each hold-off.
 *
 * Between ticks the thread parks on a condvar with a bounded timeout, so a
 * stop request wakes it immediately instead of after the full interval.
 */

mod detect;

pub use detect::{detect, take_sample, Detection};

use crate::core::errors::{MonitorError, MonitorResult};
use crate::core::limits::POLLER_THREAD_NAME;
use crate::core::types::{MemoryLimits, PressureEvent};
use crate::sampler::UsageSource;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

/// Receives the poller's single event; runs on the poller thread
pub type PressureSink = Box<dyn FnOnce(PressureEvent) + Send + 'static>;

/// Lifecycle of a poller thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Constructed, thread not yet sampling
    Idle,
    /// Sampling loop active
    Running,
    /// Stop requested or event emitted; thread on its way out
    Stopping,
    /// Thread exited
    Stopped,
}

/// State shared between the poller handle and its thread
#[derive(Debug)]
struct PollerContext {
    state: Mutex<PollerState>,
    condvar: Condvar,
}

impl PollerContext {
    fn new() -> Self {
        Self {
            state: Mutex::new(PollerState::Idle),
            condvar: Condvar::new(),
        }
    }

    /// Idle -> Running; false if a stop arrived before the thread started
    fn start(&self) -> bool {
        let mut state = self.state.lock();
        if *state == PollerState::Idle {
            *state = PollerState::Running;
            true
        } else {
            false
        }
    }

    /// Request a stop and wake the sleeping thread
    fn stop(&self) {
        let mut state = self.state.lock();
        if matches!(*state, PollerState::Idle | PollerState::Running) {
            *state = PollerState::Stopping;
        }
        self.condvar.notify_all();
    }

    /// Running -> Stopping ahead of emission; false if already stopping
    fn claim_emission(&self) -> bool {
        let mut state = self.state.lock();
        if *state == PollerState::Running {
            *state = PollerState::Stopping;
            true
        } else {
            false
        }
    }

    /// Park for `timeout`; returns false when the poller should exit
    fn sleep(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state == PollerState::Running {
            if self.condvar.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state == PollerState::Running
    }

    fn finish(&self) {
        *self.state.lock() = PollerState::Stopped;
        self.condvar.notify_all();
    }
}

/// Handle to a running poller; dropping it stops the thread
pub struct Poller {
    context: Arc<PollerContext>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start sampling `source` against `limits` every `interval`
    pub fn spawn(
        source: Arc<dyn UsageSource>,
        limits: MemoryLimits,
        interval: Duration,
        sink: PressureSink,
    ) -> MonitorResult<Self> {
        let context = Arc::new(PollerContext::new());
        let thread_context = Arc::clone(&context);

        let handle = thread::Builder::new()
            .name(POLLER_THREAD_NAME.into())
            .spawn(move || {
                run_poll_loop(&thread_context, source.as_ref(), &limits, interval, sink);
                thread_context.finish();
            })
            .map_err(|e| MonitorError::SpawnFailed {
                thread: POLLER_THREAD_NAME,
                reason: e.to_string(),
            })?;

        debug!(interval_ms = interval.as_millis() as u64, "Memory usage poller started");

        Ok(Self {
            context,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> PollerState {
        *self.context.state.lock()
    }

    /// Request a stop; returns without waiting for the thread
    pub fn stop(&self) {
        self.context.stop();
    }

    /// Stop and wait for the thread to exit
    pub fn join(mut self) {
        self.context.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Memory usage poller thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.context.stop();
        // Detach: the thread notices the stop at its next wait
        self.handle.take();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller").field("state", &self.state()).finish()
    }
}

fn run_poll_loop(
    context: &PollerContext,
    source: &dyn UsageSource,
    limits: &MemoryLimits,
    interval: Duration,
    sink: PressureSink,
) {
    if !context.start() {
        return;
    }

    loop {
        let sample = take_sample(source, limits);
        let detection = detect(&sample, limits);
        trace!(
            process_bytes = sample.process_total(),
            gpu_bytes = sample.gpu_used_bytes,
            "Memory usage sampled"
        );

        if let Some(event) = detection.event {
            if context.claim_emission() {
                sink(event);
            }
            return;
        }

        if !context.sleep(interval) {
            debug!("Memory usage poller stopped");
            return;
        }
    }
}
