//! Priority task queue shared by the worker pool.
//!
//! Lower priority values are served first; equal priorities are served in
//! insertion order. Besides the queued entries the queue counts tasks that are
//! checked out by a worker, because a checked-out task may come back as a
//! retry. Only when both are zero is the queue *drained*, which is how idle
//! workers learn that no more work can ever appear.

use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::task::{PriorityEntry, Task};

/// Result of [`TaskQueue::pop`]
#[derive(Debug, PartialEq, Eq)]
pub enum PopOutcome {
    /// A task was checked out. Report back with `finish`, `abandon` or `retry`.
    Task {
        /// Priority the task was queued at
        priority: i64,
        /// The task
        task: Task,
    },
    /// Nothing queued and nothing checked out
    Drained,
    /// Timeout elapsed while other tasks were still checked out
    TimedOut,
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<PriorityEntry>,
    next_sequence: u64,
    checked_out: usize,
    dropped: usize,
}

impl QueueState {
    fn insert(&mut self, priority: i64, task: Task) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(PriorityEntry {
            priority,
            sequence,
            task,
        });
    }
}

/// Concurrent min-priority queue of fetch tasks
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    changed: Notify,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a task
    pub fn push(&self, priority: i64, task: Task) {
        self.lock().insert(priority, task);
        self.changed.notify_waiters();
    }

    /// Wait up to `timeout` for the lowest-priority task.
    pub async fn pop(&self, timeout: Duration) -> PopOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before inspecting state so a push between the
            // check and the await is not missed.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(entry) = state.heap.pop() {
                    state.checked_out += 1;
                    return PopOutcome::Task {
                        priority: entry.priority,
                        task: entry.task,
                    };
                }
                if state.checked_out == 0 {
                    return PopOutcome::Drained;
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return PopOutcome::TimedOut;
            }
        }
    }

    /// A checked-out task completed
    pub fn finish(&self) {
        self.release(false);
    }

    /// A checked-out task was given up
    pub fn abandon(&self) {
        self.release(true);
    }

    /// Put a checked-out task back at `priority`
    pub fn retry(&self, priority: i64, task: Task) {
        {
            let mut state = self.lock();
            state.checked_out = state.checked_out.saturating_sub(1);
            state.insert(priority, task);
        }
        self.changed.notify_waiters();
    }

    fn release(&self, dropped: bool) {
        {
            let mut state = self.lock();
            state.checked_out = state.checked_out.saturating_sub(1);
            if dropped {
                state.dropped += 1;
            }
        }
        self.changed.notify_waiters();
    }

    /// Tasks waiting in the queue
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    /// Whether no task is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued plus checked-out tasks
    pub fn pending(&self) -> usize {
        let state = self.lock();
        state.heap.len() + state.checked_out
    }

    /// Tasks given up so far
    pub fn dropped(&self) -> usize {
        self.lock().dropped
    }
}
