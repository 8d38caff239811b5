//! Data fetcher implementations

use crate::{DateRange, RecordBatch};
use async_trait::async_trait;

pub mod http;
pub mod retry_formatter;
pub mod tick_parser;
pub mod user_agent;

pub use http::{HttpTickFetcher, RequestInfo};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Connection, timeout or body transfer failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Non-success HTTP status
    #[error("HTTP error {status}: {message}")]
    HttpError {
        /// Response status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Response body does not have the expected shape
    #[error("parse error: {0}")]
    ParseError(String),

    /// Response decoded but carries a value that can never be valid
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl FetcherError {
    /// Whether the same request may succeed if tried again.
    ///
    /// Network, status and shape errors are transient. An invalid record is a
    /// data invariant violation and retrying would only repeat it.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetcherError::InvalidRecord(_))
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Fetch primitive used by the worker pool
#[async_trait]
pub trait TickFetcher: Send + Sync {
    /// Fetch all ticks of `instrument` inside `range`
    ///
    /// # Arguments
    /// * `instrument` - Instrument code (e.g., "US10YR.OTC")
    /// * `range` - Half-open date range; rows outside it must not be returned
    ///
    /// # Returns
    /// The ticks in source order, possibly empty
    async fn fetch_ticks(&self, instrument: &str, range: &DateRange) -> FetcherResult<RecordBatch>;

    /// Endpoint description used in log messages
    fn endpoint(&self) -> &str;
}
