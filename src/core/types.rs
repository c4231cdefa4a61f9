/*!
 * Core Types
 * Data model shared by the configurator, sampler, poller and coordinator
 */

use super::limits::{NON_CRITICAL_RATIO, SYNCHRONOUS_MARGIN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Size type for memory counters, in bytes
pub type Bytes = u64;

/// Whether usage has crossed the hard budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Critical {
    No,
    Yes,
}

/// Whether relief must run before anything else on the main context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Synchronous {
    No,
    Yes,
}

impl From<bool> for Critical {
    fn from(value: bool) -> Self {
        if value {
            Critical::Yes
        } else {
            Critical::No
        }
    }
}

impl From<bool> for Synchronous {
    fn from(value: bool) -> Self {
        if value {
            Synchronous::Yes
        } else {
            Synchronous::No
        }
    }
}

impl fmt::Display for Critical {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Critical::Yes => write!(f, "critical"),
            Critical::No => write!(f, "non-critical"),
        }
    }
}

impl fmt::Display for Synchronous {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Synchronous::Yes => write!(f, "synchronous"),
            Synchronous::No => write!(f, "non-synchronous"),
        }
    }
}

/// A pair of budgets for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub critical_bytes: Bytes,
    pub non_critical_bytes: Bytes,
}

impl Threshold {
    /// Derive the non-critical budget from the critical one
    pub fn from_critical(critical_bytes: Bytes) -> Self {
        Self {
            critical_bytes,
            non_critical_bytes: (critical_bytes as f64 * NON_CRITICAL_RATIO) as Bytes,
        }
    }

    /// Usage above which relief has to run synchronously
    pub fn synchronous_bytes(&self) -> Bytes {
        (self.critical_bytes as f64 * SYNCHRONOUS_MARGIN) as Bytes
    }
}

/// Resolved budgets; `None` disables polling of that resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLimits {
    pub process: Option<Threshold>,
    pub gpu: Option<Threshold>,
}

impl MemoryLimits {
    /// True when at least one resource is being watched
    pub fn any_enabled(&self) -> bool {
        self.process.is_some() || self.gpu.is_some()
    }
}

/// Resident and swapped memory of the running process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMemory {
    pub resident_bytes: Bytes,
    pub swap_bytes: Bytes,
}

impl ProcessMemory {
    pub fn total(&self) -> Bytes {
        self.resident_bytes.saturating_add(self.swap_bytes)
    }
}

/// One poll tick worth of counters
#[derive(Debug, Clone, Copy)]
pub struct UsageSample {
    pub process_resident_bytes: Bytes,
    pub process_swap_bytes: Bytes,
    pub gpu_used_bytes: Bytes,
    pub timestamp: Instant,
}

impl UsageSample {
    pub fn process_total(&self) -> Bytes {
        self.process_resident_bytes
            .saturating_add(self.process_swap_bytes)
    }
}

/// Pressure notification raised by the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureEvent {
    pub critical: Critical,
    pub synchronous: Synchronous,
}

impl PressureEvent {
    pub fn new(critical: impl Into<Critical>, synchronous: impl Into<Synchronous>) -> Self {
        Self {
            critical: critical.into(),
            synchronous: synchronous.into(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.critical == Critical::Yes
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous == Synchronous::Yes
    }
}
