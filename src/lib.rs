//! # Tick Data Downloader Library
//!
//! Incrementally downloads historical price ticks for an instrument from a
//! remote HTTP source and appends the new rows to a CSV file, skipping any
//! tick already stored there.
//!
//! ## Features
//!
//! - **Prioritized retries**: failed fetches are re-queued behind fresh work
//! - **Worker pool**: a configurable number of concurrent fetch workers
//! - **Single writer**: one consumer owns the output file, no file locking needed
//! - **Resume by content**: dates already in the output file are never re-written
//! - **Progress tracking**: live progress bar and a final summary line
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tick_data_downloader::downloader::{CrawlExecutor, PipelineSettings};
//! use tick_data_downloader::fetcher::{HttpTickFetcher, RequestInfo};
//! use tick_data_downloader::output::csv::CsvTickStore;
//! use tick_data_downloader::DateRange;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let range = DateRange::parse_compact("20240101", "20240201")?;
//! let fetcher = HttpTickFetcher::new(RequestInfo::new("https://example.com/kline"));
//! let store = CsvTickStore::new("./data/us10yr.csv");
//!
//! let executor = CrawlExecutor::new(Arc::new(fetcher), Arc::new(store), range)
//!     .with_settings(PipelineSettings::default());
//! let summary = executor.run(vec!["US10YR.OTC".to_string()]).await?;
//! println!("{}/{} batches written", summary.completed, summary.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - Fetch primitive trait and the HTTP implementation
//! - [`downloader`] - Task queue, worker pool, writer and run orchestration
//! - [`output`] - CSV persistence and loading of already finished dates
//! - [`config`] - TOML configuration file
//! - [`cli`] - Command line surface

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Configuration file loading
pub mod config;

/// Task scheduling, worker pool and writer
pub mod downloader;

/// Data fetchers
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Data output writers
pub mod output;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Timestamp format used for the `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One price tick of an instrument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceTick {
    /// Tick time, wall clock of the instrument's exchange
    pub date: NaiveDateTime,
    /// Open price
    pub open: Decimal,
    /// Close price
    pub close: Decimal,
    /// High price
    pub high: Decimal,
    /// Low price
    pub low: Decimal,
    /// Absolute change against the previous close
    pub change: Decimal,
    /// Relative change against the previous close
    pub change_rate: Decimal,
}

impl PriceTick {
    /// Validate tick data integrity
    pub fn validate(&self) -> Result<(), String> {
        if self.high < self.low {
            return Err(format!(
                "High ({}) must be >= low ({})",
                self.high, self.low
            ));
        }

        if self.high < self.open || self.high < self.close {
            return Err(format!(
                "High ({}) must be >= open ({}) and close ({})",
                self.high, self.open, self.close
            ));
        }

        if self.low > self.open || self.low > self.close {
            return Err(format!(
                "Low ({}) must be <= open ({}) and close ({})",
                self.low, self.open, self.close
            ));
        }

        Ok(())
    }
}

/// Rows returned by one fetch call, in source order
pub type RecordBatch = Vec<PriceTick>;

/// Half-open date interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive start
    pub start: NaiveDateTime,
    /// Exclusive end
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Create a range, rejecting empty or inverted intervals
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, String> {
        if end <= start {
            return Err(format!("End ({end}) must be after start ({start})"));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYYMMDD` dates into a range starting at midnight of each day
    pub fn parse_compact(start: &str, end: &str) -> Result<Self, String> {
        let parse = |label: &str, input: &str| {
            NaiveDate::parse_from_str(input.trim(), "%Y%m%d")
                .map_err(|e| format!("Invalid {label} date '{input}': {e}"))
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        };
        Self::new(parse("start", start)?, parse("end", end)?)
    }

    /// Whether `ts` falls inside `[start, end)`
    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        *ts >= self.start && *ts < self.end
    }

    /// Whole days between start and end
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.date(), self.end.date())
    }
}
