//! Retry message formatting for the worker pool.
//!
//! Keeps the wording of retry, give-up and crash log lines in one place so the
//! worker loop only decides *what* happened.

use crate::fetcher::FetcherError;
use crate::DateRange;

/// Classification of fetch failures for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, timeout, reset
    Network,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 4xx other than 429
    ClientError(u16),
    /// Body could not be decoded into ticks
    MalformedResponse,
    /// Decoded data violates an invariant
    InvalidData,
}

impl FailureKind {
    /// Classify a fetcher error
    pub fn of(error: &FetcherError) -> Self {
        match error {
            FetcherError::NetworkError(_) => Self::Network,
            FetcherError::HttpError { status: 429, .. } => Self::RateLimit,
            FetcherError::HttpError { status, .. } if *status >= 500 => Self::ServerError(*status),
            FetcherError::HttpError { status, .. } => Self::ClientError(*status),
            FetcherError::ParseError(_) => Self::MalformedResponse,
            FetcherError::InvalidRecord(_) => Self::InvalidData,
        }
    }

    /// User-friendly description string used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::ClientError(code) => match code {
                403 => "request rejected",
                404 => "resource not found",
                _ => "client error",
            },
            Self::MalformedResponse => "unexpected response shape",
            Self::InvalidData => "invalid tick data",
        }
    }

    /// Suggested remediation shown once a task is given up.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Network => "Check your network connection and proxy settings",
            Self::RateLimit => "Reduce the number of workers or retry later",
            Self::ServerError(_) => "The data source may be experiencing issues, try again later",
            Self::ClientError(_) => "Check the url and [request.params] in the config file",
            Self::MalformedResponse => "Check the instrument code and the `fields` request parameter",
            Self::InvalidData => "Inspect the raw response for this instrument",
        }
    }
}

/// Context of one failed attempt.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempts made so far, including the failed one (1-based)
    pub attempt: u32,
    /// Retry limit
    pub max_attempts: u32,
    /// Failure classification
    pub kind: FailureKind,
    /// Task description, e.g. `fetch_ticks(US10YR.OTC)`
    pub task: String,
    /// Requested range
    pub range: DateRange,
    /// Original error message
    pub error_message: String,
}

impl RetryContext {
    /// Build a context from a fetch failure
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        task: impl Into<String>,
        range: DateRange,
        error: &FetcherError,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            kind: FailureKind::of(error),
            task: task.into(),
            range,
            error_message: error.to_string(),
        }
    }

    /// Message logged when the task is re-queued.
    pub fn format_retry(&self, next_priority: i64) -> String {
        format!(
            "{} fails {} time(s) after {} - requeued at priority {} {}",
            self.task,
            self.attempt,
            self.kind.description(),
            next_priority,
            self.range
        )
    }

    /// Message logged when the task is dropped.
    pub fn format_failure(&self) -> String {
        [
            format!("[FAILED] {} fails {} times. Stop retrying!", self.task, self.max_attempts),
            format!("  Last error: {}", self.error_message),
            format!("  Date range: {}", self.range),
            format!("  Suggestion: {}", self.kind.suggestion()),
        ]
        .join("\n")
    }
}
