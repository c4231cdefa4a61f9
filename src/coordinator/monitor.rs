/*!
 * Memory Pressure Monitor
 *
 * Coordinator state machine. While installed, a poller watches memory; its
 * single event is marshalled onto the main context, where the monitor
 * uninstalls itself, runs relief, measures what relief achieved and arms a
 * hold-off timer that reinstalls the poller when it fires.
 *
 *   Monitoring --event--> relief --> HeldOff --timer--> Monitoring
 */

use super::hold_off::{HoldOffPolicy, HoldOffState, ReliefReport};
use super::relief::{MallocTrimRelief, ReliefAction};
use crate::config::{ConfigSource, EnvSource, LimitConfigurator, MonitorConfig};
use crate::core::errors::MonitorResult;
use crate::core::types::{Critical, MemoryLimits, PressureEvent, Synchronous};
use crate::dispatch::{Dispatcher, MainContext, TimerToken};
use crate::monitoring::span_relief;
use crate::poller::{Poller, PollerState, PressureSink};
use crate::sampler::{ProcfsSampler, UsageSource};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Operational state of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Not watching and no hold-off pending
    Uninstalled,
    /// Installed; a poller runs if any limit is configured
    Monitoring,
    /// Waiting out the hold-off after a relief pass
    HeldOff,
}

#[derive(Default)]
struct CoordinatorState {
    installed: bool,
    poller: Option<Poller>,
    hold_off: Option<TimerToken>,
    generation: u64,
    epoch: u64,
    last_relief: Option<ReliefReport>,
}

impl CoordinatorState {
    fn hold_off_active(&self) -> bool {
        self.hold_off.as_ref().is_some_and(TimerToken::is_active)
    }

    /// Leave the installed state; every installation gets a fresh epoch
    fn take_installation(&mut self) -> Option<Poller> {
        self.installed = false;
        self.epoch += 1;
        self.poller.take()
    }
}

struct Inner {
    configurator: LimitConfigurator,
    source: Arc<dyn UsageSource>,
    dispatcher: Arc<dyn Dispatcher>,
    relief: Arc<dyn ReliefAction>,
    poll_interval: Duration,
    policy: HoldOffPolicy,
    state: Mutex<CoordinatorState>,
    under_pressure: AtomicBool,
}

/// Memory pressure coordinator
///
/// Cheap to clone; all clones drive the same monitor.
#[derive(Clone)]
pub struct MemoryPressureMonitor {
    inner: Arc<Inner>,
}

impl MemoryPressureMonitor {
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    /// Start watching. No-op while installed or while a hold-off is pending.
    pub fn install(&self) {
        let limits = self.inner.configurator.resolve();

        let mut state = self.inner.state.lock();
        if state.installed || state.hold_off_active() {
            return;
        }
        state.hold_off = None;

        if limits.any_enabled() {
            state.generation += 1;
            let sink = self.delivery_sink(state.generation);
            match Poller::spawn(
                Arc::clone(&self.inner.source),
                limits,
                self.inner.poll_interval,
                sink,
            ) {
                Ok(poller) => state.poller = Some(poller),
                Err(e) => error!(error = %e, "Memory pressure polling unavailable"),
            }
        } else {
            debug!("No memory limits configured, poller not started");
        }

        state.installed = true;
        debug!(generation = state.generation, "Memory pressure monitor installed");
    }

    /// Stop watching and cancel any pending hold-off
    pub fn uninstall(&self) {
        let poller = {
            let mut state = self.inner.state.lock();
            if let Some(token) = state.hold_off.take() {
                token.cancel();
            }
            if !state.installed {
                // Keeps a relief pass already running from arming a hold-off
                state.epoch += 1;
                return;
            }
            state.take_installation()
        };

        // Stop outside the lock; the thread exits at its next wait
        drop(poller);
        debug!("Memory pressure monitor uninstalled");
    }

    /// Report memory pressure. Ignored unless installed; the response always
    /// runs on the main context and never blocks the caller.
    pub fn trigger_pressure_event(
        &self,
        critical: impl Into<Critical>,
        synchronous: impl Into<Synchronous>,
    ) {
        let event = PressureEvent::new(critical, synchronous);
        let epoch = {
            let state = self.inner.state.lock();
            if !state.installed {
                debug!(critical = %event.critical, "Ignoring pressure event, monitor not installed");
                return;
            }
            state.epoch
        };

        info!(
            critical = %event.critical,
            synchronous = %event.synchronous,
            "Got memory pressure notification"
        );
        self.inner.under_pressure.store(true, Ordering::Release);

        if self.inner.dispatcher.is_main_context() {
            self.respond_to_memory_pressure(event, epoch);
            return;
        }

        let this = self.clone();
        let queued = self
            .inner
            .dispatcher
            .dispatch(Box::new(move || this.respond_to_memory_pressure(event, epoch)));
        if !queued {
            warn!("Main context unavailable, memory relief skipped");
            self.inner.under_pressure.store(false, Ordering::Release);
        }
    }

    pub fn is_installed(&self) -> bool {
        self.inner.state.lock().installed
    }

    /// True from a pressure event until its relief pass completes
    pub fn is_under_pressure(&self) -> bool {
        self.inner.under_pressure.load(Ordering::Acquire)
    }

    pub fn state(&self) -> MonitorState {
        let state = self.inner.state.lock();
        if state.hold_off_active() {
            MonitorState::HeldOff
        } else if state.installed {
            MonitorState::Monitoring
        } else {
            MonitorState::Uninstalled
        }
    }

    pub fn poller_state(&self) -> Option<PollerState> {
        self.inner.state.lock().poller.as_ref().map(Poller::state)
    }

    pub fn hold_off_state(&self) -> HoldOffState {
        let state = self.inner.state.lock();
        let token = state.hold_off.as_ref().filter(|t| t.is_active());
        HoldOffState {
            active: token.is_some(),
            remaining: token.map(TimerToken::remaining).unwrap_or_default(),
            last_duration: state.last_relief.map(|r| r.hold_off),
        }
    }

    pub fn last_relief(&self) -> Option<ReliefReport> {
        self.inner.state.lock().last_relief
    }

    pub fn limits(&self) -> MemoryLimits {
        self.inner.configurator.resolve()
    }

    pub fn usage_source(&self) -> Arc<dyn UsageSource> {
        Arc::clone(&self.inner.source)
    }

    pub fn configurator(&self) -> &LimitConfigurator {
        &self.inner.configurator
    }

    /// Sink handed to a poller: hop to the main context, then deliver if the
    /// poller is still the current one
    fn delivery_sink(&self, generation: u64) -> PressureSink {
        let weak = Arc::downgrade(&self.inner);
        let dispatcher = Arc::clone(&self.inner.dispatcher);
        Box::new(move |event| {
            let _ = dispatcher.dispatch(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    MemoryPressureMonitor { inner }.deliver(generation, event);
                }
            }));
        })
    }

    fn deliver(&self, generation: u64, event: PressureEvent) {
        {
            let state = self.inner.state.lock();
            if !state.installed || state.generation != generation {
                debug!(generation, current = state.generation, "Dropping stale pressure event");
                return;
            }
        }
        self.trigger_pressure_event(event.critical, event.synchronous);
    }

    /// Uninstall on behalf of the response queued during `epoch` and return
    /// the epoch the relief pass runs in. None when the monitor was
    /// uninstalled since, or another response got there first.
    fn begin_relief(&self, epoch: u64) -> Option<u64> {
        let (poller, relief_epoch) = {
            let mut state = self.inner.state.lock();
            if !state.installed || state.epoch != epoch {
                debug!(epoch, current = state.epoch, "Dropping stale pressure response");
                return None;
            }
            if let Some(token) = state.hold_off.take() {
                token.cancel();
            }
            (state.take_installation(), state.epoch)
        };

        drop(poller);
        debug!("Memory pressure monitor uninstalled for relief");
        Some(relief_epoch)
    }

    fn respond_to_memory_pressure(&self, event: PressureEvent, epoch: u64) {
        let Some(relief_epoch) = self.begin_relief(epoch) else {
            self.inner.under_pressure.store(false, Ordering::Release);
            return;
        };

        let span = span_relief(event.critical, event.synchronous);
        let _entered = span.enter();

        let start = Instant::now();
        let before = self.inner.source.sample_footprint();
        self.inner
            .relief
            .release_memory(event.critical, event.synchronous);
        let after = self.inner.source.sample_footprint();
        let elapsed = start.elapsed();

        let bytes_freed = before as i64 - after as i64;
        let hold_off = self.inner.policy.hold_off_for(bytes_freed, elapsed);
        span.record_bytes_freed(bytes_freed);
        span.record_hold_off(hold_off.as_millis() as u64);
        info!(
            bytes_freed,
            elapsed_ms = elapsed.as_millis() as u64,
            hold_off_ms = hold_off.as_millis() as u64,
            "Memory relief complete"
        );

        self.hold_off(
            relief_epoch,
            hold_off,
            ReliefReport {
                critical: event.critical,
                synchronous: event.synchronous,
                bytes_freed,
                elapsed,
                hold_off,
            },
        );
        self.inner.under_pressure.store(false, Ordering::Release);
    }

    fn hold_off(&self, epoch: u64, duration: Duration, report: ReliefReport) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let token = TimerToken::start(
            self.inner.dispatcher.as_ref(),
            duration,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    debug!("Hold-off elapsed, reinstalling");
                    MemoryPressureMonitor { inner }.install();
                }
            }),
        );

        let mut state = self.inner.state.lock();
        state.last_relief = Some(report);
        if state.epoch != epoch {
            debug!("Uninstalled during relief, hold-off dropped");
            token.cancel();
            return;
        }
        if let Some(previous) = state.hold_off.replace(token) {
            previous.cancel();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(token) = state.hold_off.take() {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for MemoryPressureMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPressureMonitor")
            .field("state", &self.state())
            .field("under_pressure", &self.is_under_pressure())
            .finish()
    }
}

/// Builder for [`MemoryPressureMonitor`]
///
/// Anything not supplied falls back to the production wiring: environment
/// configuration, procfs sampling, a dedicated main context and
/// `malloc_trim` relief.
#[derive(Default)]
pub struct MonitorBuilder {
    config: Option<MonitorConfig>,
    config_source: Option<Arc<dyn ConfigSource>>,
    process_name: Option<String>,
    source: Option<Arc<dyn UsageSource>>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    relief: Option<Arc<dyn ReliefAction>>,
}

impl MonitorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime settings; read from the config source when omitted
    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.config_source = Some(source);
        self
    }

    /// Match budgets against this name instead of argv[0]
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    pub fn with_usage_source(mut self, source: Arc<dyn UsageSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_relief(mut self, relief: impl ReliefAction + 'static) -> Self {
        self.relief = Some(Arc::new(relief));
        self
    }

    pub fn build(self) -> MonitorResult<MemoryPressureMonitor> {
        let config_source = self
            .config_source
            .unwrap_or_else(|| Arc::new(EnvSource) as Arc<dyn ConfigSource>);
        let config = self
            .config
            .unwrap_or_else(|| MonitorConfig::from_source(config_source.as_ref()));

        let configurator = match self.process_name {
            Some(name) => LimitConfigurator::with_process_name(config_source, name),
            None => LimitConfigurator::new(config_source),
        };
        let source = match self.source {
            Some(source) => source,
            None => Arc::new(ProcfsSampler::new(&config)),
        };
        let dispatcher = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => Arc::new(MainContext::spawn()?),
        };
        let relief = self
            .relief
            .unwrap_or_else(|| Arc::new(MallocTrimRelief) as Arc<dyn ReliefAction>);

        Ok(MemoryPressureMonitor {
            inner: Arc::new(Inner {
                configurator,
                source,
                dispatcher,
                relief,
                poll_interval: config.poll_interval,
                policy: config.hold_off,
                state: Mutex::new(CoordinatorState::default()),
                under_pressure: AtomicBool::new(false),
            }),
        })
    }
}
