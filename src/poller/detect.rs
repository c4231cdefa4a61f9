/*!
 * Pressure Detection
 * Compares one sample against the resolved limits
 */

use crate::core::limits::MB;
use crate::core::types::{Critical, MemoryLimits, PressureEvent, UsageSample};
use crate::sampler::UsageSource;
use std::time::Instant;

/// Outcome of one poll tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Detection {
    /// Process memory pressure; the only thing that triggers relief
    pub event: Option<PressureEvent>,
    /// GPU over its soft budget; reported, never relieved
    pub gpu: Option<Critical>,
}

/// Read the counters for every enabled resource; disabled resources are
/// never sampled and read as zero
pub fn take_sample(source: &dyn UsageSource, limits: &MemoryLimits) -> UsageSample {
    let process = if limits.process.is_some() {
        source.sample_process_memory()
    } else {
        Default::default()
    };
    let gpu_used_bytes = if limits.gpu.is_some() {
        source.sample_gpu_memory()
    } else {
        0
    };

    UsageSample {
        process_resident_bytes: process.resident_bytes,
        process_swap_bytes: process.swap_bytes,
        gpu_used_bytes,
        timestamp: Instant::now(),
    }
}

/// Apply the thresholds; every comparison is strict
pub fn detect(sample: &UsageSample, limits: &MemoryLimits) -> Detection {
    let mut detection = Detection::default();

    if let Some(threshold) = limits.process {
        let used = sample.process_total();
        if used > threshold.non_critical_bytes {
            let event = PressureEvent::new(
                used > threshold.critical_bytes,
                used > threshold.synchronous_bytes(),
            );
            tracing::warn!(
                used_mb = used / MB,
                critical = %event.critical,
                synchronous = %event.synchronous,
                "Process memory under pressure"
            );
            detection.event = Some(event);
        }
    }

    if let Some(threshold) = limits.gpu {
        let used = sample.gpu_used_bytes;
        if used != 0 && used > threshold.non_critical_bytes {
            let critical = Critical::from(used > threshold.critical_bytes);
            tracing::warn!(used_mb = used / MB, critical = %critical, "GPU memory under pressure");
            detection.gpu = Some(critical);
        }
    }

    detection
}
