//! Registry of running workers.
//!
//! Each worker holds a [`WorkerGuard`] for as long as it may still produce
//! results. Dropping the guard, including during a panic unwind, removes the
//! worker. The writer waits on [`LivenessTracker::wait_idle`] instead of
//! polling.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Identity handed out by the tracker, never reused within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Set of live workers with an idle signal
#[derive(Debug)]
pub struct LivenessTracker {
    active: Mutex<BTreeSet<WorkerId>>,
    next_id: AtomicU64,
    count: watch::Sender<usize>,
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessTracker {
    /// Create a tracker with no workers
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            active: Mutex::new(BTreeSet::new()),
            next_id: AtomicU64::new(0),
            count,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<WorkerId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new worker
    pub fn register(self: &Arc<Self>) -> WorkerGuard {
        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut active = self.lock();
            active.insert(id);
            self.count.send_replace(active.len());
        }
        debug!(worker = %id, "Worker registered");
        WorkerGuard {
            id,
            tracker: Arc::clone(self),
        }
    }

    fn deregister(&self, id: WorkerId) {
        let mut active = self.lock();
        if active.remove(&id) {
            self.count.send_replace(active.len());
            debug!(worker = %id, remaining = active.len(), "Worker deregistered");
        }
    }

    /// Number of live workers
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Whether no worker is live
    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }

    /// Resolve once no worker is live. Returns immediately if already idle.
    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

/// Membership of one worker in a [`LivenessTracker`]
#[derive(Debug)]
pub struct WorkerGuard {
    id: WorkerId,
    tracker: Arc<LivenessTracker>,
}

impl WorkerGuard {
    /// Worker identity
    pub fn id(&self) -> WorkerId {
        self.id
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.tracker.deregister(self.id);
    }
}
