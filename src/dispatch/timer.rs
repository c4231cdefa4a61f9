/*!
 * One-Shot Timer
 * Cancellable delayed job over any dispatcher
 */

use super::traits::{Dispatcher, Job};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Handle to a pending one-shot job
///
/// The job runs only if it wins the `PENDING -> FIRED` transition, so a
/// cancel that lands first always suppresses it.
#[derive(Debug, Clone)]
pub struct TimerToken {
    state: Arc<AtomicU8>,
    deadline: Instant,
}

impl TimerToken {
    /// Arm a timer that runs `job` on `dispatcher` after `delay`
    pub fn start(dispatcher: &dyn Dispatcher, delay: Duration, job: Job) -> Self {
        let state = Arc::new(AtomicU8::new(PENDING));
        let guard = Arc::clone(&state);
        dispatcher.dispatch_after(
            delay,
            Box::new(move || {
                if guard
                    .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    job();
                }
            }),
        );
        Self {
            state,
            deadline: Instant::now() + delay,
        }
    }

    /// True while the job has neither run nor been cancelled
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Suppress the job; no effect once it has fired
    pub fn cancel(&self) {
        let _ = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Time left until the job is due, zero once due or inactive
    pub fn remaining(&self) -> Duration {
        if self.is_active() {
            self.deadline.saturating_duration_since(Instant::now())
        } else {
            Duration::ZERO
        }
    }
}
