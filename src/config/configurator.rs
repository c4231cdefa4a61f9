/*!
 * Limit Configurator
 *
 * Resolves the process and GPU budgets for the running process. Each
 * resolution is latched: the first caller evaluates the configuration,
 * concurrent first callers block on the latch, and every later call returns
 * the cached result.
 */

use super::parse::{compile_pattern, match_process_limit, parse_byte_value, parse_limit_list};
use super::source::ConfigSource;
use crate::core::limits::{ENV_GPU_LIMIT, ENV_PROCESS_LIMITS, PROC_SELF_CMDLINE, WEB_PROCESS_PATTERN};
use crate::core::types::{MemoryLimits, Threshold};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Once-per-lifetime resolver of memory budgets
pub struct LimitConfigurator {
    source: Arc<dyn ConfigSource>,
    process_name: String,
    process: OnceLock<Option<Threshold>>,
    gpu: OnceLock<Option<Threshold>>,
}

impl LimitConfigurator {
    /// Configurator for the running process
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self::with_process_name(source, current_process_name())
    }

    /// Configurator for an explicit process name
    pub fn with_process_name(source: Arc<dyn ConfigSource>, process_name: impl Into<String>) -> Self {
        Self {
            source,
            process_name: process_name.into().to_lowercase(),
            process: OnceLock::new(),
            gpu: OnceLock::new(),
        }
    }

    /// Lower-cased process name the patterns are matched against
    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Process budget, or `None` when no entry applies
    pub fn resolve_process_limits(&self) -> Option<Threshold> {
        *self.process.get_or_init(|| self.evaluate_process_limits())
    }

    /// GPU budget, or `None` when unset or this is not the web process
    pub fn resolve_gpu_limits(&self) -> Option<Threshold> {
        *self.gpu.get_or_init(|| self.evaluate_gpu_limits())
    }

    /// Both budgets
    pub fn resolve(&self) -> MemoryLimits {
        MemoryLimits {
            process: self.resolve_process_limits(),
            gpu: self.resolve_gpu_limits(),
        }
    }

    fn evaluate_process_limits(&self) -> Option<Threshold> {
        let raw = self.source.get(ENV_PROCESS_LIMITS)?;
        let entries = parse_limit_list(&raw);
        let Some(critical) = match_process_limit(&entries, &self.process_name) else {
            debug!(
                process = %self.process_name,
                "No process memory limit matches, process polling disabled"
            );
            return None;
        };
        if critical == 0 {
            debug!(process = %self.process_name, "Process memory limit is zero, process polling disabled");
            return None;
        }

        let threshold = Threshold::from_critical(critical);
        info!(
            process = %self.process_name,
            critical_bytes = threshold.critical_bytes,
            non_critical_bytes = threshold.non_critical_bytes,
            "Process memory limits resolved"
        );
        Some(threshold)
    }

    fn evaluate_gpu_limits(&self) -> Option<Threshold> {
        if !self.is_web_process() {
            debug!(process = %self.process_name, "GPU limits only apply to the web process");
            return None;
        }

        let raw = self.source.get(ENV_GPU_LIMIT)?;
        let critical = match parse_byte_value(&raw) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Ignoring GPU memory limit");
                return None;
            }
        };
        if critical == 0 {
            debug!("GPU memory limit is zero, GPU polling disabled");
            return None;
        }

        let threshold = Threshold::from_critical(critical);
        info!(
            critical_bytes = threshold.critical_bytes,
            non_critical_bytes = threshold.non_critical_bytes,
            "GPU memory limits resolved"
        );
        Some(threshold)
    }

    fn is_web_process(&self) -> bool {
        compile_pattern(WEB_PROCESS_PATTERN)
            .map(|matcher| matcher.is_match(&self.process_name))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for LimitConfigurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitConfigurator")
            .field("process_name", &self.process_name)
            .field("process", &self.process.get())
            .field("gpu", &self.gpu.get())
            .finish()
    }
}

/// argv[0] of the running process, lower-cased
pub fn current_process_name() -> String {
    std::fs::read(PROC_SELF_CMDLINE)
        .ok()
        .and_then(|bytes| {
            bytes
                .split(|b| *b == 0)
                .next()
                .filter(|first| !first.is_empty())
                .map(|first| String::from_utf8_lossy(first).into_owned())
        })
        .or_else(|| std::env::args().next())
        .unwrap_or_default()
        .to_lowercase()
}
