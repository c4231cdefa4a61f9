/*!
 * Memory Pressure Monitor - Main Entry Point
 *
 * Watches this process against the budgets in the environment, trims the
 * heap under pressure and, when WEBKIT_SHOW_MEMORY is set, logs periodic
 * usage readouts. Runs until Ctrl+C.
 */

use std::error::Error;
use std::time::Duration;
use tracing::{info, warn};

use mempressure::{
    init_tracing, MallocTrimRelief, MemoryDiagnostics, MemoryPressureMonitor, MonitorConfig,
    ReadoutThrottle,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    info!("Memory pressure monitor starting...");

    let config = MonitorConfig::from_env();
    let monitor = MemoryPressureMonitor::builder()
        .with_config(config.clone())
        .with_relief(MallocTrimRelief)
        .build()?;

    let limits = monitor.limits();
    info!(
        process_name = monitor.configurator().process_name(),
        process_limit = ?limits.process.map(|t| t.critical_bytes),
        gpu_limit = ?limits.gpu.map(|t| t.critical_bytes),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Memory limits resolved"
    );

    monitor.install();

    let readout = config.readout_interval.map(|interval| {
        let diagnostics = MemoryDiagnostics::new(monitor.usage_source(), limits);
        tokio::spawn(run_readout(
            diagnostics,
            monitor.clone(),
            config.poll_interval,
            interval,
        ))
    });

    info!("Monitoring; press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    if let Some(task) = readout {
        task.abort();
    }
    monitor.uninstall();

    Ok(())
}

/// Log a usage snapshot at most once per `interval`, checked every `tick`
async fn run_readout(
    diagnostics: MemoryDiagnostics,
    monitor: MemoryPressureMonitor,
    tick: Duration,
    interval: Duration,
) {
    let throttle = ReadoutThrottle::new(interval);
    let mut ticker = tokio::time::interval(tick.min(interval));

    loop {
        ticker.tick().await;
        if !throttle.should_emit() {
            continue;
        }

        let snapshot = diagnostics.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(
                state = ?monitor.state(),
                under_pressure = monitor.is_under_pressure(),
                snapshot = %json,
                "Memory usage"
            ),
            Err(e) => warn!(error = %e, "Failed to serialize memory snapshot"),
        }
    }
}
