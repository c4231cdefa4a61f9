/*!
 * Configuration
 *
 * Budgets, sampling sources and timing for the monitor, read from an
 * environment-style key/value source.
 */

mod configurator;
pub mod parse;
mod source;

pub use configurator::{current_process_name, LimitConfigurator};
pub use parse::{parse_byte_value, parse_limit_list, LimitEntry};
pub use source::{ConfigSource, EnvSource, MapSource};

use crate::coordinator::HoldOffPolicy;
use crate::core::limits::{
    DEFAULT_GPU_TABLE, ENV_GPU_BASELINE, ENV_GPU_SOURCE, ENV_POLL_INTERVAL_MS, ENV_SHOW_MEMORY,
    POLL_INTERVAL,
};
use crate::core::types::Bytes;
use crate::sampler::GpuCounter;
use std::time::Duration;
use tracing::warn;

/// Runtime settings of the monitor (everything except the budgets, which the
/// [`LimitConfigurator`] owns)
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sampling cadence of the poller
    pub poll_interval: Duration,
    /// Where GPU usage is read from
    pub gpu_counter: GpuCounter,
    /// GPU usage already present at launch; captured from the counter when unset
    pub gpu_baseline: Option<Bytes>,
    /// Diagnostics readout cadence; `None` disables the readout
    pub readout_interval: Option<Duration>,
    /// Back-off applied after each relief pass
    pub hold_off: HoldOffPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            gpu_counter: GpuCounter::Table(DEFAULT_GPU_TABLE.into()),
            gpu_baseline: None,
            readout_interval: None,
            hold_off: HoldOffPolicy::default(),
        }
    }
}

impl MonitorConfig {
    /// Read overrides from `source`, keeping defaults for anything unset or
    /// unparsable
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let mut config = Self::default();

        if let Some(raw) = source.get(ENV_POLL_INTERVAL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.poll_interval = Duration::from_millis(ms),
                _ => warn!(value = %raw, "Ignoring invalid poll interval"),
            }
        }

        if let Some(raw) = source.get(ENV_GPU_SOURCE) {
            config.gpu_counter = GpuCounter::from_path(raw.trim());
        }

        if let Some(raw) = source.get(ENV_GPU_BASELINE) {
            match parse_byte_value(&raw) {
                Ok(bytes) => config.gpu_baseline = Some(bytes),
                Err(e) => warn!(error = %e, "Ignoring GPU baseline"),
            }
        }

        if let Some(raw) = source.get(ENV_SHOW_MEMORY) {
            match raw.trim().parse::<f64>() {
                Ok(secs) if secs > 0.0 && secs.is_finite() => {
                    config.readout_interval = Some(Duration::from_secs_f64(secs))
                }
                Ok(_) => {}
                Err(_) => warn!(value = %raw, "Ignoring invalid memory readout interval"),
            }
        }

        config
    }

    /// Shorthand for [`MonitorConfig::from_source`] over the process environment
    pub fn from_env() -> Self {
        Self::from_source(&EnvSource)
    }
}
