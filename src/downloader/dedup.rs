//! Filtering of fetched ticks against dates already on disk

use chrono::NaiveDateTime;
use std::collections::HashSet;

use crate::RecordBatch;

/// Dates present in the output before the run started.
///
/// Loaded once and only read afterwards; rows written during the run are not
/// added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishedSet {
    dates: HashSet<NaiveDateTime>,
}

impl FinishedSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a date. Returns false if it was already present.
    pub fn insert(&mut self, date: NaiveDateTime) -> bool {
        self.dates.insert(date)
    }

    /// Whether `date` is already stored
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        self.dates.contains(date)
    }

    /// Number of dates
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl FromIterator<NaiveDateTime> for FinishedSet {
    fn from_iter<I: IntoIterator<Item = NaiveDateTime>>(iter: I) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

/// Drop every tick whose date is in `finished`, keeping source order.
pub fn filter_finished(batch: RecordBatch, finished: &FinishedSet) -> RecordBatch {
    if finished.is_empty() {
        return batch;
    }
    batch
        .into_iter()
        .filter(|tick| !finished.contains(&tick.date))
        .collect()
}
