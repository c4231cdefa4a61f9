/*!
 * Hold-Off Policy
 *
 * After each relief pass the poller stays down for a while. When relief
 * freed a meaningful amount the pause is proportional to how long relief
 * took (so relief runs at most ~1/multiplier of the time); when it freed
 * little, the pause falls back to the fixed maximum. The minimum is a floor
 * for both cases.
 */

use crate::core::limits::{
    HOLD_OFF_MULTIPLIER, MAXIMUM_HOLD_OFF, MINIMUM_BYTES_FREED, MINIMUM_HOLD_OFF,
};
use crate::core::types::{Bytes, Critical, Synchronous};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Back-off parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldOffPolicy {
    pub minimum: Duration,
    pub maximum: Duration,
    pub multiplier: u32,
    pub minimum_bytes_freed: Bytes,
}

impl Default for HoldOffPolicy {
    fn default() -> Self {
        Self {
            minimum: MINIMUM_HOLD_OFF,
            maximum: MAXIMUM_HOLD_OFF,
            multiplier: HOLD_OFF_MULTIPLIER,
            minimum_bytes_freed: MINIMUM_BYTES_FREED,
        }
    }
}

impl HoldOffPolicy {
    /// Hold-off following a relief pass that took `elapsed` and freed
    /// `bytes_freed` (negative when usage grew)
    pub fn hold_off_for(&self, bytes_freed: i64, elapsed: Duration) -> Duration {
        let effective = bytes_freed > 0 && bytes_freed as Bytes >= self.minimum_bytes_freed;
        let hold_off = if effective {
            elapsed.saturating_mul(self.multiplier)
        } else {
            self.maximum
        };
        hold_off.max(self.minimum)
    }
}

/// Observable hold-off status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HoldOffState {
    /// Timer pending; new pressure events cannot be raised
    pub active: bool,
    /// Time until the poller is reinstalled
    pub remaining: Duration,
    /// Hold-off chosen after the most recent relief pass
    pub last_duration: Option<Duration>,
}

/// Outcome of the most recent relief pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliefReport {
    pub critical: Critical,
    pub synchronous: Synchronous,
    pub bytes_freed: i64,
    pub elapsed: Duration,
    pub hold_off: Duration,
}
