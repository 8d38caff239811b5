//! Task and priority entry types

use std::cmp::Ordering;
use std::fmt;

/// Work a task performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Fetch every tick of one instrument over the run's date range
    FetchTicks {
        /// Instrument code, e.g. `US10YR.OTC`
        instrument: String,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchTicks { instrument } => write!(f, "fetch_ticks({instrument})"),
        }
    }
}

/// One unit of work. Only `attempts` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// What to do
    pub operation: Operation,
    /// Failed attempts so far
    pub attempts: u32,
}

impl Task {
    /// Fresh fetch task for `instrument`
    pub fn fetch_ticks(instrument: impl Into<String>) -> Self {
        Self {
            operation: Operation::FetchTicks {
                instrument: instrument.into(),
            },
            attempts: 0,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.operation.fmt(f)
    }
}

/// Heap entry. `sequence` is the insertion counter used to break priority ties.
#[derive(Debug)]
pub(crate) struct PriorityEntry {
    pub(crate) priority: i64,
    pub(crate) sequence: u64,
    pub(crate) task: Task,
}

impl PriorityEntry {
    fn key(&self) -> (i64, u64) {
        (self.priority, self.sequence)
    }
}

impl PartialEq for PriorityEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PriorityEntry {}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityEntry {
    // BinaryHeap is a max-heap: the smallest (priority, sequence) must compare greatest
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}
