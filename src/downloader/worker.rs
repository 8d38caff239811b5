//! Fetch worker loop
//!
//! A worker checks tasks out of the [`TaskQueue`], calls the fetcher and
//! either forwards the filtered batch to the [`ResultQueue`] or applies the
//! retry policy. It exits when the queue is drained, on shutdown, or on the
//! first non-transient error.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::config::PipelineSettings;
use super::dedup::{filter_finished, FinishedSet};
use super::liveness::WorkerGuard;
use super::queue::{PopOutcome, TaskQueue};
use super::results::ResultQueue;
use super::task::{Operation, Task};
use crate::fetcher::retry_formatter::{FailureKind, RetryContext};
use crate::fetcher::{FetcherError, TickFetcher};
use crate::metrics::{self, FetchMetrics};
use crate::shutdown::SharedShutdown;
use crate::DateRange;

/// Why a worker stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// No task left anywhere in the pipeline
    Drained,
    /// Shutdown was requested
    Shutdown,
    /// A non-transient error ended the worker
    Failed(String),
}

/// State shared by all workers of one run
pub(crate) struct WorkerContext {
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) results: Arc<ResultQueue>,
    pub(crate) fetcher: Arc<dyn TickFetcher>,
    pub(crate) finished: Arc<FinishedSet>,
    pub(crate) range: DateRange,
    pub(crate) settings: PipelineSettings,
    pub(crate) shutdown: Option<SharedShutdown>,
}

impl WorkerContext {
    async fn next_task(&self) -> Option<PopOutcome> {
        match &self.shutdown {
            Some(shutdown) => {
                if shutdown.is_shutdown_requested() {
                    return None;
                }
                tokio::select! {
                    biased;
                    _ = shutdown.wait_for_shutdown() => None,
                    outcome = self.queue.pop(self.settings.task_wait_timeout) => Some(outcome),
                }
            }
            None => Some(self.queue.pop(self.settings.task_wait_timeout).await),
        }
    }

    /// Run one checked-out task to a terminal state or back into the queue
    async fn process(&self, priority: i64, mut task: Task) -> Result<(), FetcherError> {
        let Operation::FetchTicks { instrument } = task.operation.clone();
        let fetch = FetchMetrics::start(instrument.as_str(), task.attempts + 1);

        match self.fetcher.fetch_ticks(&instrument, &self.range).await {
            Ok(batch) => {
                fetch.record_success(batch.len());
                let fetched = batch.len();
                let fresh = filter_finished(batch, &self.finished);
                debug!(
                    task = %task,
                    fetched,
                    fresh = fresh.len(),
                    "Forwarding batch to writer"
                );
                self.results.push(fresh);
                self.queue.finish();
                Ok(())
            }
            Err(e) if !e.is_transient() => {
                fetch.record_failure(FailureKind::of(&e).description());
                Err(e)
            }
            Err(e) => {
                fetch.record_failure(FailureKind::of(&e).description());
                task.attempts += 1;
                let context = RetryContext::new(
                    task.attempts,
                    self.settings.max_retries,
                    task.to_string(),
                    self.range,
                    &e,
                );

                if task.attempts < self.settings.max_retries {
                    let next_priority =
                        priority.saturating_add(self.settings.retry_priority_penalty);
                    warn!(
                        task = %task,
                        attempt = task.attempts,
                        priority = next_priority,
                        error = %e,
                        "{}",
                        context.format_retry(next_priority)
                    );
                    metrics::record_retry(&instrument, task.attempts);
                    self.queue.retry(next_priority, task);
                } else {
                    error!(task = %task, attempts = task.attempts, "{}", context.format_failure());
                    metrics::record_task_dropped(&instrument);
                    self.queue.abandon();
                }
                Ok(())
            }
        }
    }
}

/// Releases a checked-out task if processing unwinds, so the queue can still drain
struct InFlight<'a> {
    queue: &'a TaskQueue,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(queue: &'a TaskQueue) -> Self {
        Self { queue, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.queue.abandon();
        }
    }
}

/// Worker main loop. The guard is held until the function returns.
pub(crate) async fn run_worker(ctx: Arc<WorkerContext>, guard: WorkerGuard) -> WorkerExit {
    debug!(worker = %guard.id(), "Worker started");

    let exit = loop {
        let Some(outcome) = ctx.next_task().await else {
            info!(worker = %guard.id(), "Shutdown requested, worker stops taking tasks");
            break WorkerExit::Shutdown;
        };

        match outcome {
            PopOutcome::Task { priority, task } => {
                let description = task.to_string();
                let attempts = task.attempts;
                let in_flight = InFlight::new(&ctx.queue);
                let result = ctx.process(priority, task).await;
                in_flight.disarm();
                if let Err(e) = result {
                    error!(
                        worker = %guard.id(),
                        task = %description,
                        attempts,
                        error = %e,
                        "Unexpected error, worker exiting"
                    );
                    ctx.queue.abandon();
                    break WorkerExit::Failed(e.to_string());
                }
            }
            PopOutcome::Drained => break WorkerExit::Drained,
            PopOutcome::TimedOut => {
                debug!(
                    worker = %guard.id(),
                    pending = ctx.queue.pending(),
                    "No task available yet, waiting on in-flight work"
                );
            }
        }
    };

    debug!(worker = %guard.id(), ?exit, "Worker finished");
    drop(guard);
    exit
}
