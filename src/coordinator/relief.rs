/*!
 * Relief Actions
 * Routines that actually give memory back
 */

use crate::core::types::{Critical, Synchronous};
use std::sync::Arc;
use tracing::debug;

/// Frees memory in response to pressure; always called on the main context
pub trait ReliefAction: Send + Sync {
    fn release_memory(&self, critical: Critical, synchronous: Synchronous);
}

impl<F> ReliefAction for F
where
    F: Fn(Critical, Synchronous) + Send + Sync,
{
    fn release_memory(&self, critical: Critical, synchronous: Synchronous) {
        self(critical, synchronous)
    }
}

/// Returns free heap pages to the OS
#[derive(Debug, Clone, Copy, Default)]
pub struct MallocTrimRelief;

impl ReliefAction for MallocTrimRelief {
    fn release_memory(&self, _critical: Critical, _synchronous: Synchronous) {
        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        {
            // SAFETY: malloc_trim only walks allocator-internal state
            let released = unsafe { libc::malloc_trim(0) };
            debug!(released = released != 0, "malloc_trim");
        }
        #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
        debug!("malloc_trim unavailable on this platform");
    }
}

/// Runs several relief actions in order, e.g. cache eviction before trim
#[derive(Clone, Default)]
pub struct ReliefChain {
    actions: Vec<Arc<dyn ReliefAction>>,
}

impl ReliefChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, action: impl ReliefAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl ReliefAction for ReliefChain {
    fn release_memory(&self, critical: Critical, synchronous: Synchronous) {
        for action in &self.actions {
            action.release_memory(critical, synchronous);
        }
    }
}

impl std::fmt::Debug for ReliefChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReliefChain")
            .field("actions", &self.actions.len())
            .finish()
    }
}
