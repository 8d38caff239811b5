//! Observability metrics for the tick crawler
//!
//! Counters and histograms are recorded through the `metrics` facade. Without
//! an installed recorder every call is a no-op, so the pipeline records
//! unconditionally and `--metrics-addr` only decides whether a Prometheus
//! scrape endpoint is exposed.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address to bind the scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "fetch_attempts_total",
        Unit::Count,
        "Fetch calls made, by instrument and outcome"
    );
    describe_histogram!(
        "fetch_duration_seconds",
        Unit::Seconds,
        "Duration of one fetch call"
    );
    describe_counter!(
        "fetch_retries_total",
        Unit::Count,
        "Tasks re-queued after a failed fetch"
    );
    describe_counter!(
        "tasks_dropped_total",
        Unit::Count,
        "Tasks given up after exhausting retries"
    );
    describe_counter!(
        "batches_written_total",
        Unit::Count,
        "Non-empty batches appended to the output"
    );
    describe_counter!(
        "rows_written_total",
        Unit::Count,
        "Tick rows appended to the output"
    );
    describe_counter!(
        "empty_batches_total",
        Unit::Count,
        "Batches with no new ticks after filtering"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Timing and outcome of one fetch call
pub struct FetchMetrics {
    instrument: String,
    attempt: u32,
    start_time: Instant,
}

impl FetchMetrics {
    /// Start timing a fetch
    pub fn start(instrument: impl Into<String>, attempt: u32) -> Self {
        Self {
            instrument: instrument.into(),
            attempt,
            start_time: Instant::now(),
        }
    }

    fn record(&self, outcome: &'static str) {
        counter!(
            "fetch_attempts_total",
            "instrument" => self.instrument.clone(),
            "outcome" => outcome,
        )
        .increment(1);
        histogram!(
            "fetch_duration_seconds",
            "instrument" => self.instrument.clone(),
        )
        .record(self.start_time.elapsed().as_secs_f64());
    }

    /// Fetch returned `rows` ticks
    pub fn record_success(&self, rows: usize) {
        self.record("success");
        debug!(
            instrument = %self.instrument,
            attempt = self.attempt,
            rows,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Fetch succeeded"
        );
    }

    /// Fetch failed with an error of the given kind
    pub fn record_failure(&self, kind: &str) {
        self.record("failure");
        debug!(
            instrument = %self.instrument,
            attempt = self.attempt,
            kind,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Fetch failed"
        );
    }
}

/// A task was re-queued
pub fn record_retry(instrument: &str, attempt: u32) {
    counter!(
        "fetch_retries_total",
        "instrument" => instrument.to_string(),
        "attempt" => attempt.to_string(),
    )
    .increment(1);
}

/// A task was given up
pub fn record_task_dropped(instrument: &str) {
    counter!(
        "tasks_dropped_total",
        "instrument" => instrument.to_string(),
    )
    .increment(1);
}

/// A batch of `rows` ticks was persisted
pub fn record_batch_written(rows: usize) {
    counter!("batches_written_total").increment(1);
    counter!("rows_written_total").increment(rows as u64);
}

/// A batch had nothing new to write
pub fn record_empty_batch() {
    counter!("empty_batches_total").increment(1);
}
