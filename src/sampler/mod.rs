/*!
 * Usage Sampler
 * Process and GPU memory counters read from OS interfaces
 */

mod gpu;
pub mod procfs;

pub use gpu::{parse_table_column, GpuCounter, GpuReader};

use crate::config::MonitorConfig;
use crate::core::limits::{KB, PROC_SELF_STATM, PROC_SELF_STATUS};
use crate::core::types::{Bytes, ProcessMemory};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Memory counter provider
///
/// Implementations never fail: an unreadable counter reports zero, which the
/// poller treats as "not measurable this tick".
pub trait UsageSource: Send + Sync {
    /// Resident and swapped memory of the running process
    fn sample_process_memory(&self) -> ProcessMemory;

    /// GPU memory used since launch
    fn sample_gpu_memory(&self) -> Bytes;

    /// Private memory of the running process, used to measure relief
    fn sample_footprint(&self) -> Bytes;

    /// Size of the GPU heap, when the platform reports it
    fn gpu_total_bytes(&self) -> Option<Bytes> {
        None
    }
}

/// Linux procfs-backed sampler
#[derive(Debug)]
pub struct ProcfsSampler {
    status_path: PathBuf,
    statm_path: PathBuf,
    page_size: Bytes,
    gpu: GpuReader,
}

impl ProcfsSampler {
    pub fn new(config: &MonitorConfig) -> Self {
        Self::with_paths(
            PROC_SELF_STATUS,
            PROC_SELF_STATM,
            GpuReader::new(config.gpu_counter.clone(), config.gpu_baseline),
        )
    }

    /// Sampler over explicit counter files
    pub fn with_paths(
        status_path: impl Into<PathBuf>,
        statm_path: impl Into<PathBuf>,
        gpu: GpuReader,
    ) -> Self {
        Self {
            status_path: status_path.into(),
            statm_path: statm_path.into(),
            page_size: procfs::page_size(),
            gpu,
        }
    }

    pub fn gpu(&self) -> &GpuReader {
        &self.gpu
    }

    fn read(path: &Path) -> Option<String> {
        match std::fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                trace!(path = %path.display(), error = %e, "Memory counter unreadable");
                None
            }
        }
    }
}

impl UsageSource for ProcfsSampler {
    fn sample_process_memory(&self) -> ProcessMemory {
        Self::read(&self.status_path)
            .and_then(|text| procfs::parse_status(&text))
            .unwrap_or_default()
    }

    fn sample_gpu_memory(&self) -> Bytes {
        self.gpu.used_since_launch()
    }

    fn sample_footprint(&self) -> Bytes {
        Self::read(&self.statm_path)
            .and_then(|text| procfs::parse_statm(&text, self.page_size))
            .or_else(|| {
                Self::read(&self.status_path)
                    .and_then(|text| procfs::token_value(&text, "VmRSS:", KB))
            })
            .unwrap_or(0)
    }

    fn gpu_total_bytes(&self) -> Option<Bytes> {
        self.gpu.total()
    }
}
