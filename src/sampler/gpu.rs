/*!
 * GPU Counters
 *
 * Two accounting layouts are supported:
 * - Vendor heap tables (`/proc/brcm/core`): a header row naming the columns
 *   followed by one row per heap; the graphics heap row carries a `GFX` tag.
 * - Scalar files (sysfs style): a single integer of bytes.
 *
 * Readings are reported relative to a baseline taken at launch so that
 * allocations made by the driver before this process started are not
 * counted against it.
 */

use crate::core::limits::MB;
use crate::core::types::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Where GPU usage is read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "path", rename_all = "snake_case")]
pub enum GpuCounter {
    /// Vendor heap table with `MB` and `used` (percent) columns
    Table(PathBuf),
    /// Single integer of bytes
    Scalar(PathBuf),
    /// No GPU accounting on this platform
    Unavailable,
}

impl GpuCounter {
    /// Pick the layout from the path: `.../brcm/...` and `.../core` are heap
    /// tables, anything else is a scalar file
    pub fn from_path(path: &str) -> Self {
        if path.is_empty() {
            return GpuCounter::Unavailable;
        }
        let path = PathBuf::from(path);
        let is_table = path.components().any(|c| c.as_os_str() == "brcm")
            || path.file_name().is_some_and(|name| name == "core");
        if is_table {
            GpuCounter::Table(path)
        } else {
            GpuCounter::Scalar(path)
        }
    }

    /// Absolute GPU memory in use, in bytes
    pub fn read_used(&self) -> Option<Bytes> {
        match self {
            GpuCounter::Table(path) => {
                let text = read_counter(path)?;
                let total = table_total_bytes(&text)?;
                let percent = parse_table_column(&text, "used")?;
                Some(total.saturating_mul(percent) / 100)
            }
            GpuCounter::Scalar(path) => {
                let text = read_counter(path)?;
                text.trim().parse::<Bytes>().ok()
            }
            GpuCounter::Unavailable => None,
        }
    }

    /// Size of the graphics heap, when the layout reports it
    pub fn read_total(&self) -> Option<Bytes> {
        match self {
            GpuCounter::Table(path) => table_total_bytes(&read_counter(path)?),
            _ => None,
        }
    }
}

fn read_counter(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            trace!(path = %path.display(), error = %e, "GPU counter unreadable");
            None
        }
    }
}

fn table_total_bytes(text: &str) -> Option<Bytes> {
    parse_table_column(text, "MB").map(|mb| mb.saturating_mul(MB))
}

/// Value of `column` in the graphics heap row of a vendor table
///
/// The header and the `GFX` row line up token for token, so the value sits
/// at the same distance from the `GFX` tag as `column` sits from `name`.
pub fn parse_table_column(text: &str, column: &str) -> Option<Bytes> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let gfx = tokens.iter().position(|t| t.contains("GFX"))?;
    let header = &tokens[..gfx];
    let name = header.iter().position(|t| *t == "name")?;
    let col = header.iter().position(|t| *t == column)?;

    let index = gfx.checked_add(col)?.checked_sub(name)?;
    tokens
        .get(index)?
        .trim_end_matches('%')
        .parse::<Bytes>()
        .ok()
}

/// GPU counter with the launch baseline applied
#[derive(Debug, Clone)]
pub struct GpuReader {
    counter: GpuCounter,
    baseline: Bytes,
}

impl GpuReader {
    /// Use `baseline` when configured, otherwise capture the current reading
    pub fn new(counter: GpuCounter, baseline: Option<Bytes>) -> Self {
        let baseline = baseline.unwrap_or_else(|| counter.read_used().unwrap_or(0));
        debug!(counter = ?counter, baseline_bytes = baseline, "GPU baseline set");
        Self { counter, baseline }
    }

    pub fn baseline(&self) -> Bytes {
        self.baseline
    }

    pub fn counter(&self) -> &GpuCounter {
        &self.counter
    }

    /// Usage attributable to this process's lifetime; zero when unreadable
    pub fn used_since_launch(&self) -> Bytes {
        self.counter
            .read_used()
            .unwrap_or(0)
            .saturating_sub(self.baseline)
    }

    pub fn total(&self) -> Option<Bytes> {
        self.counter.read_total()
    }
}
