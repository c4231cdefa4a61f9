/*!
 * Main Context
 *
 * Standalone main execution context: a dedicated thread draining a job
 * channel, with a deadline-ordered heap for delayed jobs. Jobs run one at a
 * time in submission order; delayed jobs with the same deadline run in the
 * order they were queued.
 */

use super::traits::{Dispatcher, Job};
use crate::core::errors::{MonitorError, MonitorResult};
use crate::core::limits::MAIN_CONTEXT_THREAD_NAME;
use flume::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

enum Message {
    Run(Job),
    RunAt(Instant, Job),
    Shutdown,
}

struct Scheduled {
    deadline: Instant,
    seq: u64,
    job: Job,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the max-heap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Thread-backed main context
pub struct MainContext {
    sender: Sender<Message>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MainContext {
    /// Start the main context thread
    pub fn spawn() -> MonitorResult<Self> {
        let (sender, receiver) = flume::unbounded();
        let handle = thread::Builder::new()
            .name(MAIN_CONTEXT_THREAD_NAME.into())
            .spawn(move || run_event_loop(receiver))
            .map_err(|e| MonitorError::SpawnFailed {
                thread: MAIN_CONTEXT_THREAD_NAME,
                reason: e.to_string(),
            })?;

        debug!("Main context started");

        Ok(Self {
            sender,
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queue a job, reporting a closed context instead of dropping silently
    pub fn try_dispatch(&self, job: Job) -> MonitorResult<()> {
        self.sender
            .send(Message::Run(job))
            .map_err(|_| MonitorError::DispatcherClosed)
    }

    /// Stop the loop and wait for it; pending delayed jobs are discarded
    pub fn shutdown(&self) {
        let _ = self.sender.send(Message::Shutdown);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if thread::current().id() == self.thread_id {
                return;
            }
            if handle.join().is_err() {
                error!("Main context thread panicked");
            }
        }
    }
}

impl Dispatcher for MainContext {
    fn dispatch(&self, job: Job) -> bool {
        if self.try_dispatch(job).is_err() {
            warn!("Main context closed, dropping job");
            return false;
        }
        true
    }

    fn dispatch_after(&self, delay: Duration, job: Job) {
        let deadline = Instant::now() + delay;
        if self.sender.send(Message::RunAt(deadline, job)).is_err() {
            warn!("Main context closed, dropping delayed job");
        }
    }

    fn is_main_context(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for MainContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainContext")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("Main context job panicked");
    }
}

fn run_event_loop(receiver: Receiver<Message>) {
    let mut timers: BinaryHeap<Scheduled> = BinaryHeap::new();
    let mut seq: u64 = 0;

    loop {
        let now = Instant::now();
        while timers.peek().is_some_and(|top| top.deadline <= now) {
            if let Some(due) = timers.pop() {
                run_job(due.job);
            }
        }

        let message = match timers.peek() {
            Some(top) => match receiver.recv_deadline(top.deadline) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match receiver.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        match message {
            Message::Run(job) => run_job(job),
            Message::RunAt(deadline, job) => {
                seq += 1;
                timers.push(Scheduled { deadline, seq, job });
            }
            Message::Shutdown => break,
        }
    }

    debug!(discarded = timers.len(), "Main context stopped");
}
