//! FIFO hand-off of filtered batches from workers to the writer

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

use crate::RecordBatch;

/// Unbounded FIFO of record batches
#[derive(Debug, Default)]
pub struct ResultQueue {
    batches: Mutex<VecDeque<RecordBatch>>,
    available: Notify,
}

impl ResultQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RecordBatch>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a batch. Empty batches are meaningful and kept.
    pub fn push(&self, batch: RecordBatch) {
        self.lock().push_back(batch);
        self.available.notify_one();
    }

    /// Take the oldest batch without waiting
    pub fn try_pop(&self) -> Option<RecordBatch> {
        self.lock().pop_front()
    }

    /// Wait for the oldest batch. Cancel safe.
    pub async fn pop(&self) -> RecordBatch {
        loop {
            let notified = self.available.notified();
            if let Some(batch) = self.try_pop() {
                return batch;
            }
            notified.await;
        }
    }

    /// Batches waiting
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
