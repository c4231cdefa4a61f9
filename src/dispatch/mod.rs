/*!
 * Main-Context Dispatch
 *
 * All coordinator state changes and relief actions run on one serialized
 * execution context. Background threads reach it only through a
 * [`Dispatcher`].
 */

mod main_context;
mod timer;
mod traits;

pub use main_context::MainContext;
pub use timer::TimerToken;
pub use traits::{Dispatcher, Job};
