/*!
 * Memory Diagnostics
 *
 * Read-only view of current usage against the configured budgets, for
 * overlays and periodic log readouts.
 */

use crate::core::limits::MB;
use crate::core::types::{Bytes, MemoryLimits, Threshold};
use crate::sampler::UsageSource;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-in-time usage readout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    /// Resident plus swapped process memory, in MiB
    pub used_ram_mb: u64,
    /// GPU memory used since launch, in MiB
    pub used_gfx_mb: u64,
    /// Process usage as a percentage of its critical budget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_ram_percent: Option<u8>,
    /// GPU usage as a percentage of its critical budget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_gfx_percent: Option<u8>,
    /// Size of the GPU heap, when the counter reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_gfx_mb: Option<u64>,
}

/// Usage getters over a sampler and a set of budgets
#[derive(Clone)]
pub struct MemoryDiagnostics {
    source: Arc<dyn UsageSource>,
    limits: MemoryLimits,
}

impl MemoryDiagnostics {
    pub fn new(source: Arc<dyn UsageSource>, limits: MemoryLimits) -> Self {
        Self { source, limits }
    }

    pub fn limits(&self) -> &MemoryLimits {
        &self.limits
    }

    pub fn used_ram_bytes(&self) -> Bytes {
        self.source.sample_process_memory().total()
    }

    pub fn used_gfx_bytes(&self) -> Bytes {
        self.source.sample_gpu_memory()
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let ram = self.used_ram_bytes();
        let gfx = self.used_gfx_bytes();

        DiagnosticsSnapshot {
            used_ram_mb: ram / MB,
            used_gfx_mb: gfx / MB,
            used_ram_percent: self.limits.process.map(|t| percent_of(ram, &t)),
            used_gfx_percent: self.limits.gpu.map(|t| percent_of(gfx, &t)),
            total_gfx_mb: self.source.gpu_total_bytes().map(|b| b / MB),
        }
    }
}

impl std::fmt::Debug for MemoryDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDiagnostics")
            .field("limits", &self.limits)
            .finish()
    }
}

/// `used` as a percentage of the critical budget, saturating at `u8::MAX`
fn percent_of(used: Bytes, threshold: &Threshold) -> u8 {
    if threshold.critical_bytes == 0 {
        return u8::MAX;
    }
    let percent = (used as u128 * 100) / threshold.critical_bytes as u128;
    percent.min(u8::MAX as u128) as u8
}

/// Lets a readout through at most once per interval
#[derive(Debug)]
pub struct ReadoutThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl ReadoutThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn should_emit(&self) -> bool {
        self.should_emit_at(Instant::now())
    }

    pub fn should_emit_at(&self, now: Instant) -> bool {
        let mut last = self.last.lock();
        match *last {
            Some(previous) if now.saturating_duration_since(previous) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
