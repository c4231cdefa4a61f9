/*!
 * Dispatcher Traits
 * Seam between the monitor and whatever owns the main execution context
 */

use std::time::Duration;

/// Unit of work queued onto the main context
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Serialized execution context shared by the coordinator and relief actions
///
/// Embedders with their own event loop (GLib, winit, a tokio `LocalSet`)
/// implement this over it; [`super::MainContext`] is the standalone loop.
pub trait Dispatcher: Send + Sync {
    /// Queue `job`; never blocks the caller. False when the context is gone
    /// and the job was dropped.
    fn dispatch(&self, job: Job) -> bool;

    /// Queue `job` to run once `delay` has elapsed
    fn dispatch_after(&self, delay: Duration, job: Job);

    /// True when called from the main context itself
    fn is_main_context(&self) -> bool;
}
