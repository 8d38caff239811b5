//! Task scheduling, worker pool and writer
//!
//! A run moves fetch tasks through a producer/consumer pipeline:
//!
//! 1. **Seeding**: one [`task::Task`] per instrument enters the
//!    [`queue::TaskQueue`] at priority 0
//! 2. **Workers**: a pool of [`worker`] loops call the fetcher, filter the
//!    batch with [`dedup::filter_finished`] and hand it to the
//!    [`results::ResultQueue`]. Failed tasks are re-queued at a worse priority
//!    until the retry limit is reached
//! 3. **Writer**: one [`writer`] loop appends batches to the store and updates
//!    the [`progress::ProgressCounter`]
//! 4. **Termination**: the writer stops once the [`liveness::LivenessTracker`]
//!    reports no live worker and no batch is left
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tick_data_downloader::downloader::{CrawlExecutor, PipelineSettings};
//! use tick_data_downloader::fetcher::{HttpTickFetcher, RequestInfo};
//! use tick_data_downloader::output::csv::CsvTickStore;
//! use tick_data_downloader::DateRange;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let range = DateRange::parse_compact("20240101", "20240105")?;
//! let executor = CrawlExecutor::new(
//!     Arc::new(HttpTickFetcher::new(RequestInfo::new("https://example.com/kline"))),
//!     Arc::new(CsvTickStore::new("./us10yr.csv")),
//!     range,
//! )
//! .with_settings(PipelineSettings::default().with_workers(2));
//! let summary = executor.run(vec!["US10YR.OTC".to_string()]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Only startup failures surface as [`PipelineError`]. Fetch failures are
//! handled per task, append failures stop the writer and are reported in
//! [`RunSummary::writer_error`].

pub mod config;
pub mod dedup;
pub mod executor;
pub mod liveness;
pub mod progress;
pub mod queue;
pub mod results;
pub mod task;
pub mod worker;
pub mod writer;

pub use config::PipelineSettings;
pub use dedup::{filter_finished, FinishedSet};
pub use executor::{CrawlExecutor, RunSummary};
pub use liveness::{LivenessTracker, WorkerGuard, WorkerId};
pub use progress::{IndicatifProgress, NoopProgress, ProgressCounter, ProgressSink, ProgressSnapshot};
pub use queue::{PopOutcome, TaskQueue};
pub use results::ResultQueue;
pub use task::{Operation, Task};

use crate::output::OutputError;

/// Errors that abort a run before or outside the pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Settings cannot drive a run
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Nothing to seed
    #[error("no instruments to crawl")]
    NoTasks,

    /// Finished dates could not be loaded
    #[error("failed to load finished dates: {0}")]
    LoadFinished(#[from] OutputError),

    /// A pipeline task panicked
    #[error("pipeline task panicked: {0}")]
    TaskPanicked(String),
}
