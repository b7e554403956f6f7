//! Dynamic task queue with quiescence detection
//!
//! Workers block in [`TaskQueue::next`] until a task is available. A task
//! handed out is tracked as running until its [`TaskLease`] is dropped, which
//! makes "queue empty and nothing running" observable without polling: the
//! last lease to drop on an empty queue wakes every idle worker, and they all
//! return `None`.

use super::task::CrawlTask;
use crate::state::TaskState;
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<CrawlTask>,
    running: usize,
    closed: bool,
}

impl QueueState {
    fn is_quiescent(&self) -> bool {
        self.pending.is_empty() && self.running == 0
    }
}

/// FIFO of crawl tasks shared by the worker pool
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

/// A task checked out of the queue
///
/// The task counts as running until the lease is dropped. This also covers
/// workers that panic or are aborted, since both drop the lease.
#[derive(Debug)]
pub struct TaskLease {
    task: CrawlTask,
    state: TaskState,
    queue: Arc<TaskQueue>,
}

impl TaskLease {
    /// Returns the leased task
    pub fn task(&self) -> &CrawlTask {
        &self.task
    }

    /// Current lifecycle state of the leased task
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Moves the task to `next` if the lifecycle allows it
    ///
    /// # Returns
    ///
    /// `false` (and the state is left unchanged) for an invalid transition
    pub fn advance(&mut self, next: TaskState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                "Refusing task transition {} -> {} for {}",
                self.state,
                next,
                self.task.target
            );
            return false;
        }
        self.state = next;
        true
    }
}

impl Deref for TaskLease {
    type Target = CrawlTask;

    fn deref(&self) -> &CrawlTask {
        &self.task
    }
}

impl Drop for TaskLease {
    fn drop(&mut self) {
        if self.state.is_active() {
            tracing::debug!("Task {} released while {}", self.task.target, self.state);
        }
        self.queue.finish_one();
    }
}

impl TaskQueue {
    /// Creates an empty, open queue
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends a task
    ///
    /// # Returns
    ///
    /// `false` if the queue has been closed and the task was not admitted
    pub fn push(&self, task: CrawlTask) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.pending.push_back(task);
        }
        self.notify.notify_waiters();
        true
    }

    /// Waits for the next task
    ///
    /// # Returns
    ///
    /// * `Some(TaskLease)` - A task to run
    /// * `None` - The queue was closed, or it is empty with nothing running
    pub async fn next(self: &Arc<Self>) -> Option<TaskLease> {
        loop {
            // Register interest before inspecting the state so a wake-up
            // between the check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(task) = state.pending.pop_front() {
                    state.running += 1;
                    let mut lease = TaskLease {
                        task,
                        state: TaskState::Queued,
                        queue: Arc::clone(self),
                    };
                    lease.advance(TaskState::Running);
                    return Some(lease);
                }
                if state.running == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Closes the queue: no task is admitted or handed out afterwards
    ///
    /// # Returns
    ///
    /// The number of queued tasks that were discarded
    pub fn close(&self) -> usize {
        let dropped = {
            let mut state = self.lock();
            state.closed = true;
            let dropped = state.pending.len();
            state.pending.clear();
            dropped
        };
        self.notify.notify_waiters();
        dropped
    }

    /// Returns true once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of tasks waiting to be picked up
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of leases currently held by workers
    pub fn running(&self) -> usize {
        self.lock().running
    }

    fn finish_one(&self) {
        let quiescent = {
            let mut state = self.lock();
            state.running = state.running.saturating_sub(1);
            state.is_quiescent()
        };
        if quiescent {
            self.notify.notify_waiters();
        }
    }

    // Counters stay consistent under poisoning: every mutation is a single step.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
