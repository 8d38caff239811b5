//! Progress tracking for a crawl run.
//!
//! [`ProgressCounter`] is the shared `completed`/`total` pair. It is only
//! mutated by the writer but may be read at any time, so every access goes
//! through the lock. Rendering is delegated to a [`ProgressSink`].

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Point-in-time copy of the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    /// Batches persisted
    pub completed: u64,
    /// Expected batches, lowered when a task turns out to have no data
    pub total: u64,
}

impl ProgressSnapshot {
    /// Completion percentage (0-100). An empty total counts as done.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }
}

/// Shared `completed <= total` counter
#[derive(Debug, Default)]
pub struct ProgressCounter {
    state: Mutex<ProgressSnapshot>,
}

impl ProgressCounter {
    /// Counter expecting `total` batches
    pub fn new(total: u64) -> Self {
        Self {
            state: Mutex::new(ProgressSnapshot {
                completed: 0,
                total,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A batch was persisted
    pub fn record_completed(&self) -> ProgressSnapshot {
        let mut state = self.lock();
        if state.completed < state.total {
            state.completed += 1;
        }
        *state
    }

    /// A task produced nothing to write
    pub fn record_empty(&self) -> ProgressSnapshot {
        let mut state = self.lock();
        if state.total > state.completed {
            state.total -= 1;
        }
        *state
    }

    /// Current values
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.lock()
    }
}

/// Receiver of progress updates
pub trait ProgressSink: Send + Sync {
    /// Counter changed
    fn update(&self, snapshot: ProgressSnapshot);

    /// Run ended
    fn finish(&self, snapshot: ProgressSnapshot);
}

/// Discards updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn update(&self, _snapshot: ProgressSnapshot) {}

    fn finish(&self, _snapshot: ProgressSnapshot) {}
}

/// Terminal progress bar
#[derive(Debug, Clone)]
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Progress bar labelled with `message`
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(message.into());
        Self { bar }
    }

    /// Wrap an existing bar, e.g. a hidden one
    pub fn with_bar(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl ProgressSink for IndicatifProgress {
    fn update(&self, snapshot: ProgressSnapshot) {
        self.bar.set_length(snapshot.total);
        self.bar.set_position(snapshot.completed);
    }

    fn finish(&self, snapshot: ProgressSnapshot) {
        self.update(snapshot);
        self.bar.finish();
    }
}
