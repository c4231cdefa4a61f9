/*!
 * Pressure Flow Tests
 * Poller sampling through to relief on a real main context
 */

use crate::support::SequenceSource;
use mempressure::core::limits::{ENV_GPU_LIMIT, ENV_PROCESS_LIMITS, MB};
use mempressure::{
    Critical, Dispatcher, MainContext, MapSource, MemoryLimits, MemoryPressureMonitor, MonitorConfig,
    MonitorState, Poller, PressureEvent, Synchronous, Threshold, UsageSource,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(10);

fn process_limits(critical: u64) -> MemoryLimits {
    MemoryLimits {
        process: Some(Threshold::from_critical(critical)),
        gpu: None,
    }
}

fn run_poller(source: Arc<SequenceSource>, limits: MemoryLimits) -> Option<PressureEvent> {
    let (tx, rx) = flume::bounded(1);
    let poller = Poller::spawn(
        source,
        limits,
        TICK,
        Box::new(move |event| {
            let _ = tx.send(event);
        }),
    )
    .unwrap();

    let event = rx.recv_timeout(Duration::from_secs(2)).ok();
    poller.join();
    event
}

#[test]
fn test_soft_budget_crossing_emits_non_critical() {
    let source = SequenceSource::new(&[90 * MB, 96 * MB, 101 * MB]);
    let event = run_poller(source.clone(), process_limits(100 * MB)).unwrap();

    assert_eq!(event, PressureEvent::new(Critical::No, Synchronous::No));
    // One-shot: the 101MB reading is never taken
    assert_eq!(source.process_reads(), 2);
}

#[test]
fn test_critical_crossing_below_synchronous_margin() {
    let source = SequenceSource::new(&[90 * MB, 94 * MB, 101 * MB]);
    let event = run_poller(source.clone(), process_limits(100 * MB)).unwrap();

    assert!(event.is_critical());
    assert!(!event.is_synchronous());
    assert_eq!(source.process_reads(), 3);
}

#[test]
fn test_gpu_unset_never_sampled() {
    let source = SequenceSource::with_gpu(&[10 * MB], 500 * MB);
    let (tx, rx) = flume::bounded(1);
    let poller = Poller::spawn(
        source.clone(),
        process_limits(100 * MB),
        TICK,
        Box::new(move |event| {
            let _ = tx.send(event);
        }),
    )
    .unwrap();

    thread::sleep(TICK * 8);
    poller.join();

    assert!(rx.try_recv().is_err());
    assert!(source.process_reads() >= 2);
    assert_eq!(source.gpu_reads(), 0);
}

#[test]
fn test_gpu_only_pressure_does_not_emit() {
    let source = SequenceSource::with_gpu(&[0], 500 * MB);
    let limits = MemoryLimits {
        process: None,
        gpu: Some(Threshold::from_critical(100 * MB)),
    };
    let (tx, rx) = flume::bounded(1);
    let poller = Poller::spawn(
        source.clone(),
        limits,
        TICK,
        Box::new(move |event| {
            let _ = tx.send(event);
        }),
    )
    .unwrap();

    thread::sleep(TICK * 5);
    poller.join();

    assert!(rx.try_recv().is_err());
    assert!(source.gpu_reads() >= 1);
    assert_eq!(source.process_reads(), 0);
}

#[test]
fn test_end_to_end_relief_and_reinstall() {
    let source = SequenceSource::with_footprints(&[90 * MB, 101 * MB, 50 * MB], &[101 * MB, 50 * MB]);
    let (relief_tx, relief_rx) = flume::unbounded();
    let config = MonitorConfig {
        poll_interval: TICK,
        ..MonitorConfig::default()
    };

    let monitor = MemoryPressureMonitor::builder()
        .with_config(config)
        .with_config_source(Arc::new(
            MapSource::new()
                .with(ENV_PROCESS_LIMITS, "WPEWebProcess:100M")
                .with(ENV_GPU_LIMIT, "64M"),
        ))
        .with_process_name("WPEWebProcess")
        .with_usage_source(source.clone() as Arc<dyn UsageSource>)
        .with_dispatcher(Arc::new(MainContext::spawn().unwrap()))
        .with_relief(move |c: Critical, s: Synchronous| {
            let _ = relief_tx.send((c, s, thread::current().name().map(str::to_owned)));
        })
        .build()
        .unwrap();

    assert!(monitor.limits().gpu.is_some());
    monitor.install();

    let (critical, synchronous, thread_name) =
        relief_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!((critical, synchronous), (Critical::Yes, Synchronous::No));
    assert_eq!(thread_name.as_deref(), Some("mempressure-main"));

    // 51MB freed in well under 50ms: hold-off is the 1s floor
    let deadline = Instant::now() + Duration::from_secs(1);
    while monitor.last_relief().is_none() && Instant::now() < deadline {
        thread::sleep(TICK);
    }
    let report = monitor.last_relief().unwrap();
    assert_eq!(report.bytes_freed, 51 * MB as i64);
    assert_eq!(report.hold_off, Duration::from_secs(1));
    assert_eq!(monitor.state(), MonitorState::HeldOff);
    assert!(monitor.hold_off_state().remaining <= Duration::from_secs(1));

    // Timer reinstalls; usage is now low so no second relief
    let deadline = Instant::now() + Duration::from_secs(3);
    while monitor.state() != MonitorState::Monitoring && Instant::now() < deadline {
        thread::sleep(TICK);
    }
    assert_eq!(monitor.state(), MonitorState::Monitoring);
    assert!(relief_rx.recv_timeout(TICK * 10).is_err());

    monitor.uninstall();
    assert_eq!(monitor.state(), MonitorState::Uninstalled);
}

#[test]
fn test_trigger_after_uninstall_is_noop() {
    let (relief_tx, relief_rx) = flume::unbounded();
    let monitor = MemoryPressureMonitor::builder()
        .with_config_source(Arc::new(MapSource::new()))
        .with_process_name("test")
        .with_usage_source(SequenceSource::new(&[]) as Arc<dyn UsageSource>)
        .with_dispatcher(Arc::new(MainContext::spawn().unwrap()))
        .with_relief(move |c: Critical, _s: Synchronous| {
            let _ = relief_tx.send(c);
        })
        .build()
        .unwrap();

    monitor.install();
    monitor.uninstall();
    monitor.trigger_pressure_event(true, true);

    assert!(!monitor.is_under_pressure());
    assert!(relief_rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn test_trigger_from_background_thread_never_blocks() {
    let (release_tx, release_rx) = flume::bounded::<()>(0);
    let (done_tx, done_rx) = flume::unbounded();
    let monitor = MemoryPressureMonitor::builder()
        .with_config_source(Arc::new(MapSource::new()))
        .with_process_name("test")
        .with_usage_source(SequenceSource::new(&[]) as Arc<dyn UsageSource>)
        .with_dispatcher(Arc::new(MainContext::spawn().unwrap()))
        .with_relief(move |_c: Critical, _s: Synchronous| {
            // Park the main context until the test lets go
            let _ = release_rx.recv_timeout(Duration::from_secs(2));
            let _ = done_tx.send(());
        })
        .build()
        .unwrap();

    monitor.install();
    let start = Instant::now();
    monitor.trigger_pressure_event(Critical::No, Synchronous::No);
    assert!(start.elapsed() < Duration::from_millis(100));
    assert!(monitor.is_under_pressure());

    let _ = release_tx.send(());
    done_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(1);
    while monitor.is_under_pressure() && Instant::now() < deadline {
        thread::sleep(TICK);
    }
    assert!(!monitor.is_under_pressure());
}

#[test]
fn test_uninstall_while_response_queued_skips_relief() {
    let (release_tx, release_rx) = flume::bounded::<()>(0);
    let (relief_tx, relief_rx) = flume::unbounded();
    let context = Arc::new(MainContext::spawn().unwrap());
    let monitor = MemoryPressureMonitor::builder()
        .with_config_source(Arc::new(MapSource::new()))
        .with_process_name("test")
        .with_usage_source(SequenceSource::new(&[]) as Arc<dyn UsageSource>)
        .with_dispatcher(context.clone())
        .with_relief(move |c: Critical, _s: Synchronous| {
            let _ = relief_tx.send(c);
        })
        .build()
        .unwrap();

    // Hold the main context busy so the response stays queued
    assert!(context.dispatch(Box::new(move || {
        let _ = release_rx.recv_timeout(Duration::from_secs(2));
    })));

    monitor.install();
    monitor.trigger_pressure_event(Critical::Yes, Synchronous::No);
    monitor.uninstall();
    let _ = release_tx.send(());

    assert!(relief_rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert!(!monitor.is_under_pressure());
    assert_eq!(monitor.last_relief(), None);
    assert_eq!(monitor.state(), MonitorState::Uninstalled);
    assert!(!monitor.is_installed());
}
