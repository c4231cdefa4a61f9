/*!
 * Memory Pressure Monitor Library
 *
 * Watches process and GPU memory against configured budgets and, when the
 * process crosses its budget, runs relief on the main execution context
 * followed by a proportional hold-off before monitoring resumes.
 */

pub mod config;
pub mod coordinator;
pub mod core;
pub mod dispatch;
pub mod monitoring;
pub mod poller;
pub mod sampler;

// Re-exports
pub use config::{ConfigSource, EnvSource, LimitConfigurator, MapSource, MonitorConfig};
pub use coordinator::{
    HoldOffPolicy, HoldOffState, MallocTrimRelief, MemoryPressureMonitor, MonitorBuilder,
    MonitorState, ReliefAction, ReliefChain, ReliefReport,
};
pub use crate::core::errors::{ConfigError, MonitorError, MonitorResult};
pub use crate::core::types::{
    Bytes, Critical, MemoryLimits, PressureEvent, ProcessMemory, Synchronous, Threshold,
    UsageSample,
};
pub use dispatch::{Dispatcher, Job, MainContext, TimerToken};
pub use monitoring::{init_tracing, DiagnosticsSnapshot, MemoryDiagnostics, ReadoutThrottle};
pub use poller::{Poller, PollerState, PressureSink};
pub use sampler::{GpuCounter, GpuReader, ProcfsSampler, UsageSource};
