/*!
 * Pressure Coordinator
 * Install/uninstall lifecycle, relief dispatch and hold-off scheduling
 */

mod hold_off;
mod monitor;
mod relief;

pub use hold_off::{HoldOffPolicy, HoldOffState, ReliefReport};
pub use monitor::{MemoryPressureMonitor, MonitorBuilder, MonitorState};
pub use relief::{MallocTrimRelief, ReliefAction, ReliefChain};
