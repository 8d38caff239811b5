//! Data output writers

use crate::downloader::dedup::FinishedSet;
use crate::{DateRange, PriceTick};

pub mod csv;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV read or write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Stored `date` value that cannot be parsed
    #[error("invalid date '{value}' at row {row}")]
    InvalidDate {
        /// Offending value
        value: String,
        /// 1-based data row
        row: usize,
    },

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Durable storage for tick batches.
///
/// Only the writer task calls [`TickStore::append`], so implementations need
/// no internal locking against concurrent appends.
pub trait TickStore: Send + Sync {
    /// Dates already stored inside `range`. A missing store is an empty set.
    fn load_finished(&self, range: &DateRange) -> OutputResult<FinishedSet>;

    /// Append ticks, creating the store with a header if it does not exist
    fn append(&self, ticks: &[PriceTick]) -> OutputResult<()>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}
