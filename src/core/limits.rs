/*!
 * System Limits and Constants
 *
 * Centralized location for the monitor's thresholds, intervals and magic
 * numbers. Grouped by the component that consumes them.
 */

use std::time::Duration;

// =============================================================================
// UNITS
// =============================================================================

/// One kibibyte
pub const KB: u64 = 1024;

/// One mebibyte
pub const MB: u64 = 1024 * 1024;

// =============================================================================
// LIMIT CONFIGURATION
// =============================================================================

/// Process budget list, `Pattern:Value[,Pattern:Value]*`
pub const ENV_PROCESS_LIMITS: &str = "WPE_POLL_MAX_MEMORY";

/// Single GPU budget, same value syntax as the process list
pub const ENV_GPU_LIMIT: &str = "WPE_POLL_MAX_MEMORY_GPU";

/// GPU memory already in use at launch, subtracted from every reading
pub const ENV_GPU_BASELINE: &str = "WPE_POLL_GPU_BASELINE";

/// Path of the GPU accounting counter
pub const ENV_GPU_SOURCE: &str = "WPE_POLL_GPU_SOURCE";

/// Poll interval override in milliseconds
pub const ENV_POLL_INTERVAL_MS: &str = "WPE_POLL_INTERVAL_MS";

/// Diagnostics readout interval in seconds
pub const ENV_SHOW_MEMORY: &str = "WEBKIT_SHOW_MEMORY";

/// Switches log output to JSON when set to `1` or `true`
pub const ENV_TRACE_JSON: &str = "MEMPRESSURE_TRACE_JSON";

/// Non-critical threshold as a fraction of the critical one
pub const NON_CRITICAL_RATIO: f64 = 0.95;

/// Margin above critical at which relief must run synchronously
pub const SYNCHRONOUS_MARGIN: f64 = 1.05;

/// GPU budgets only apply to processes matching this pattern
pub const WEB_PROCESS_PATTERN: &str = "*wpewebprocess";

// =============================================================================
// SAMPLING
// =============================================================================

/// Per-process status table (VmRSS / VmSwap in kB)
pub const PROC_SELF_STATUS: &str = "/proc/self/status";

/// Per-process page counts (size resident shared ...)
pub const PROC_SELF_STATM: &str = "/proc/self/statm";

/// NUL separated argv of the running process
pub const PROC_SELF_CMDLINE: &str = "/proc/self/cmdline";

/// Broadcom heap accounting table
pub const DEFAULT_GPU_TABLE: &str = "/proc/brcm/core";

/// Fallback when sysconf cannot report the page size
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

// =============================================================================
// POLLING
// =============================================================================

/// Sampling cadence of the poller thread
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poller thread name
pub const POLLER_THREAD_NAME: &str = "mempressure-poller";

/// Main context thread name
pub const MAIN_CONTEXT_THREAD_NAME: &str = "mempressure-main";

// =============================================================================
// HOLD-OFF
// =============================================================================

/// Never re-arm sooner than this after a relief pass
pub const MINIMUM_HOLD_OFF: Duration = Duration::from_secs(1);

/// Hold-off used when relief did not free enough memory
pub const MAXIMUM_HOLD_OFF: Duration = Duration::from_secs(1);

/// Relief must free at least this much for the proportional hold-off to apply
pub const MINIMUM_BYTES_FREED: u64 = MB;

/// Hold-off is this many times the relief duration (about a 5% duty cycle)
pub const HOLD_OFF_MULTIPLIER: u32 = 20;

/// Relief passes slower than this are logged as warnings
pub const SLOW_RELIEF: Duration = Duration::from_millis(100);
