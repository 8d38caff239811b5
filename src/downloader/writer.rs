//! Single consumer of the result queue.
//!
//! The writer is the only code that touches the output store. It stops once
//! every worker has deregistered and the result queue is empty; a failed
//! append stops it immediately.

use std::sync::Arc;
use tracing::{debug, error, info};

use super::liveness::LivenessTracker;
use super::progress::{ProgressCounter, ProgressSink};
use super::results::ResultQueue;
use crate::metrics;
use crate::output::{OutputError, TickStore};
use crate::RecordBatch;

/// What the writer did before stopping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Empty batches seen
    pub empty_batches: u64,
    /// Rows appended
    pub rows_written: u64,
}

pub(crate) struct WriterContext {
    pub(crate) results: Arc<ResultQueue>,
    pub(crate) liveness: Arc<LivenessTracker>,
    pub(crate) store: Arc<dyn TickStore>,
    pub(crate) progress: Arc<ProgressCounter>,
    pub(crate) sink: Arc<dyn ProgressSink>,
}

impl WriterContext {
    fn handle(&self, batch: RecordBatch, stats: &mut WriterStats) -> Result<(), OutputError> {
        if batch.is_empty() {
            let snapshot = self.progress.record_empty();
            stats.empty_batches += 1;
            metrics::record_empty_batch();
            debug!(total = snapshot.total, "Empty batch, lowering expected total");
            self.sink.update(snapshot);
            return Ok(());
        }

        self.store.append(&batch)?;
        let snapshot = self.progress.record_completed();
        stats.rows_written += batch.len() as u64;
        metrics::record_batch_written(batch.len());
        info!(
            rows = batch.len(),
            completed = snapshot.completed,
            total = snapshot.total,
            "Batch written"
        );
        self.sink.update(snapshot);
        Ok(())
    }
}

/// Writer main loop. Returns the stats so far alongside any append error.
pub(crate) async fn run_writer(ctx: WriterContext) -> (WriterStats, Option<OutputError>) {
    let mut stats = WriterStats::default();
    debug!(location = %ctx.store.location(), "Writer started");

    loop {
        let batch = tokio::select! {
            biased;
            batch = ctx.results.pop() => batch,
            _ = ctx.liveness.wait_idle() => match ctx.results.try_pop() {
                Some(batch) => batch,
                None => break,
            },
        };

        if let Err(e) = ctx.handle(batch, &mut stats) {
            error!(
                location = %ctx.store.location(),
                error = %e,
                "Failed to persist batch, writer stopping"
            );
            return (stats, Some(e));
        }
    }

    debug!(?stats, "Writer finished");
    (stats, None)
}
