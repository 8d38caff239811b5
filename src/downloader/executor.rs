//! Crawl executor: wires the queues, worker pool and writer for one run

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use super::config::{PipelineSettings, SEED_PRIORITY};
use super::liveness::LivenessTracker;
use super::progress::{NoopProgress, ProgressCounter, ProgressSink};
use super::queue::TaskQueue;
use super::results::ResultQueue;
use super::task::Task;
use super::worker::{run_worker, WorkerContext, WorkerExit};
use super::writer::{run_writer, WriterContext};
use super::PipelineError;
use crate::fetcher::TickFetcher;
use crate::output::TickStore;
use crate::shutdown::{self, SharedShutdown};
use crate::DateRange;

/// Outcome of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Batches persisted
    pub completed: u64,
    /// Expected batches after empty results were discounted
    pub total: u64,
    /// Tick rows appended
    pub rows_written: u64,
    /// Fetches that brought no new ticks
    pub empty_batches: u64,
    /// Tasks given up after exhausting retries or crashing a worker
    pub dropped_tasks: usize,
    /// Workers that exited on a non-transient error
    pub failed_workers: usize,
    /// Whether shutdown cut the run short
    pub interrupted: bool,
    /// Append error that stopped the writer, if any
    pub writer_error: Option<String>,
}

/// Runs the fetch pipeline for one date range
pub struct CrawlExecutor {
    fetcher: Arc<dyn TickFetcher>,
    store: Arc<dyn TickStore>,
    range: DateRange,
    settings: PipelineSettings,
    progress: Arc<dyn ProgressSink>,
    shutdown: Option<SharedShutdown>,
}

impl CrawlExecutor {
    /// Executor with default settings and no progress display
    pub fn new(fetcher: Arc<dyn TickFetcher>, store: Arc<dyn TickStore>, range: DateRange) -> Self {
        Self {
            fetcher,
            store,
            range,
            settings: PipelineSettings::default(),
            progress: Arc::new(NoopProgress),
            shutdown: shutdown::get_global_shutdown(),
        }
    }

    /// Override pipeline settings
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Report progress to `sink`
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Settings in effect
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Crawl every instrument in `instruments` and block until the pipeline drains.
    pub async fn run(&self, instruments: Vec<String>) -> Result<RunSummary, PipelineError> {
        self.settings
            .validate()
            .map_err(PipelineError::InvalidSettings)?;
        if instruments.is_empty() {
            return Err(PipelineError::NoTasks);
        }

        let span = info_span!(
            "crawl",
            range = %self.range,
            workers = self.settings.workers,
            source = %self.fetcher.endpoint(),
            output = %self.store.location()
        );
        self.run_inner(instruments).instrument(span).await
    }

    async fn run_inner(&self, instruments: Vec<String>) -> Result<RunSummary, PipelineError> {
        let finished = Arc::new(self.store.load_finished(&self.range)?);
        info!(
            instruments = instruments.len(),
            finished = finished.len(),
            "Starting crawl"
        );

        let queue = Arc::new(TaskQueue::new());
        for instrument in &instruments {
            queue.push(SEED_PRIORITY, Task::fetch_ticks(instrument.as_str()));
        }

        let progress = Arc::new(ProgressCounter::new(instruments.len() as u64));
        self.progress.update(progress.snapshot());

        let results = Arc::new(ResultQueue::new());
        let liveness = Arc::new(LivenessTracker::new());

        // Every guard exists before the writer starts, so it cannot observe an
        // idle pool that simply has not started yet.
        let guards: Vec<_> = (0..self.settings.workers)
            .map(|_| liveness.register())
            .collect();

        let worker_ctx = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            results: Arc::clone(&results),
            fetcher: Arc::clone(&self.fetcher),
            finished,
            range: self.range,
            settings: self.settings.clone(),
            shutdown: self.shutdown.clone(),
        });

        let writer = tokio::spawn(
            run_writer(WriterContext {
                results: Arc::clone(&results),
                liveness: Arc::clone(&liveness),
                store: Arc::clone(&self.store),
                progress: Arc::clone(&progress),
                sink: Arc::clone(&self.progress),
            })
            .instrument(info_span!("writer")),
        );

        let workers: Vec<_> = guards
            .into_iter()
            .map(|guard| {
                let span = info_span!("worker", id = %guard.id());
                tokio::spawn(run_worker(Arc::clone(&worker_ctx), guard).instrument(span))
            })
            .collect();

        let mut summary = RunSummary::default();
        for joined in join_all(workers).await {
            match joined {
                Ok(WorkerExit::Drained) => {}
                Ok(WorkerExit::Shutdown) => summary.interrupted = true,
                Ok(WorkerExit::Failed(_)) => summary.failed_workers += 1,
                Err(e) => {
                    error!(error = %e, "Worker task panicked");
                    summary.failed_workers += 1;
                }
            }
        }

        let (stats, writer_error) = writer
            .await
            .map_err(|e| PipelineError::TaskPanicked(format!("writer: {e}")))?;

        let snapshot = progress.snapshot();
        self.progress.finish(snapshot);

        summary.completed = snapshot.completed;
        summary.total = snapshot.total;
        summary.rows_written = stats.rows_written;
        summary.empty_batches = stats.empty_batches;
        summary.dropped_tasks = queue.dropped();
        summary.writer_error = writer_error.map(|e| e.to_string());

        if summary.interrupted {
            warn!(remaining = queue.len(), "Crawl interrupted before all tasks ran");
        }
        info!(
            completed = summary.completed,
            total = summary.total,
            rows = summary.rows_written,
            empty = summary.empty_batches,
            dropped = summary.dropped_tasks,
            percent = snapshot.percentage(),
            "{}/{} finished",
            summary.completed,
            summary.total
        );

        Ok(summary)
    }
}
