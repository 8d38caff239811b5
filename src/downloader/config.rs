//! Pipeline configuration constants

use std::time::Duration;

/// Default number of concurrent fetch workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Upper bound on the worker pool size.
/// The source serves one instrument per task, so more workers than this only
/// adds idle tasks.
pub const MAX_WORKERS: usize = 32;

/// Attempts allowed per task before it is dropped.
/// A task failing this many times is logged and never retried again.
pub const MAX_RETRIES: u32 = 3;

/// Priority penalty added on every retry.
/// Retried tasks sort behind fresh tasks seeded at priority 0.
pub const RETRY_PRIORITY_PENALTY: i64 = 2;

/// How long an idle worker waits on the task queue before logging a heartbeat.
pub const TASK_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Priority of seed tasks
pub const SEED_PRIORITY: i64 = 0;

/// Tunables of one crawl run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Worker pool size
    pub workers: usize,
    /// Attempts per task
    pub max_retries: u32,
    /// Priority increase per retry
    pub retry_priority_penalty: i64,
    /// Bounded wait on the task queue
    pub task_wait_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_retries: MAX_RETRIES,
            retry_priority_penalty: RETRY_PRIORITY_PENALTY,
            task_wait_timeout: TASK_WAIT_TIMEOUT,
        }
    }
}

impl PipelineSettings {
    /// Set the worker pool size
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the retry limit
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retry priority penalty
    pub fn with_retry_priority_penalty(mut self, penalty: i64) -> Self {
        self.retry_priority_penalty = penalty;
        self
    }

    /// Set the task queue wait timeout
    pub fn with_task_wait_timeout(mut self, timeout: Duration) -> Self {
        self.task_wait_timeout = timeout;
        self
    }

    /// Check the settings can drive a run
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(format!(
                "workers must be between 1 and {MAX_WORKERS}, got {}",
                self.workers
            ));
        }
        if self.max_retries == 0 {
            return Err("max_retries must be at least 1".to_string());
        }
        if self.retry_priority_penalty < 0 {
            return Err(format!(
                "retry_priority_penalty must not be negative, got {}",
                self.retry_priority_penalty
            ));
        }
        if self.task_wait_timeout.is_zero() {
            return Err("task_wait_timeout must be positive".to_string());
        }
        Ok(())
    }
}
