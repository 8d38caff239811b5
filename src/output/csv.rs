//! CSV tick store
//!
//! Files are UTF-8 with a leading byte-order mark so spreadsheet tools pick the
//! right encoding. Column order is fixed:
//! `date,open,close,high,low,change,change_rate`.

use crate::downloader::dedup::FinishedSet;
use crate::{DateRange, PriceTick, DATE_FORMAT};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult, TickStore};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// UTF-8 byte-order mark
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header row, in column order
pub const HEADER: [&str; 7] = ["date", "open", "close", "high", "low", "change", "change_rate"];

/// CSV record for a price tick
#[derive(Debug, Serialize)]
struct TickRecord {
    date: String,
    open: String,
    close: String,
    high: String,
    low: String,
    change: String,
    change_rate: String,
}

impl From<&PriceTick> for TickRecord {
    fn from(tick: &PriceTick) -> Self {
        Self {
            date: tick.date.format(DATE_FORMAT).to_string(),
            open: tick.open.to_string(),
            close: tick.close.to_string(),
            high: tick.high.to_string(),
            low: tick.low.to_string(),
            change: tick.change.to_string(),
            change_rate: tick.change_rate.to_string(),
        }
    }
}

/// Append-only CSV store for one instrument
#[derive(Debug, Clone)]
pub struct CsvTickStore {
    path: PathBuf,
    buffer_size: usize,
}

impl CsvTickStore {
    /// Create a store at `path`. Nothing is touched on disk until the first append.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Create a store with a custom write buffer size
    pub fn new_with_buffer_size<P: Into<PathBuf>>(path: P, buffer_size: usize) -> Self {
        Self {
            path: path.into(),
            buffer_size,
        }
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_append(&self) -> OutputResult<(File, bool)> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OutputError::IoError(format!("Failed to create directory: {e}"))
                })?;
            }
        }

        // A zero-length file (crash before the first write) still needs a header
        let is_new = std::fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| OutputError::IoError(format!("Failed to open file: {e}")))?;

        Ok((file, is_new))
    }
}

/// Map a csv error, keeping I/O failures distinguishable from bad content
fn read_error(path: &Path, e: csv::Error) -> OutputError {
    match e.kind() {
        csv::ErrorKind::Io(io) => {
            OutputError::IoError(format!("Failed to read {}: {io}", path.display()))
        }
        _ => OutputError::CsvError(format!("Failed to read {}: {e}", path.display())),
    }
}

/// Read the `date` column of `path` and keep the values inside `range`.
///
/// Rows are streamed one at a time; a leading byte-order mark is skipped by the
/// csv reader. Returns an empty set when the file does not exist or is empty.
pub fn read_finished_dates(path: &Path, range: &DateRange) -> OutputResult<FinishedSet> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No existing output, nothing finished yet");
            return Ok(FinishedSet::default());
        }
        Err(e) => {
            return Err(OutputError::IoError(format!(
                "Failed to open {}: {e}",
                path.display()
            )))
        }
    };

    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = reader.headers().map_err(|e| read_error(path, e))?;
    if headers.is_empty() {
        return Ok(FinishedSet::default());
    }
    let Some(date_idx) = headers
        .iter()
        .position(|h| h.trim_start_matches('\u{FEFF}').trim() == "date")
    else {
        return Err(OutputError::CsvError(format!(
            "{} has no 'date' column",
            path.display()
        )));
    };

    let mut finished = FinishedSet::default();
    let mut record = StringRecord::new();
    let mut row = 0;
    while reader
        .read_record(&mut record)
        .map_err(|e| read_error(path, e))?
    {
        row += 1;
        let Some(value) = record.get(date_idx) else {
            continue;
        };
        let date = NaiveDateTime::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
            OutputError::InvalidDate {
                value: value.to_string(),
                row,
            }
        })?;
        if range.contains(&date) {
            finished.insert(date);
        }
    }

    Ok(finished)
}

impl TickStore for CsvTickStore {
    fn load_finished(&self, range: &DateRange) -> OutputResult<FinishedSet> {
        let finished = read_finished_dates(&self.path, range)?;
        info!(
            path = %self.path.display(),
            finished = finished.len(),
            "Loaded finished dates"
        );
        Ok(finished)
    }

    fn append(&self, ticks: &[PriceTick]) -> OutputResult<()> {
        let (file, is_new) = self.open_for_append()?;
        let mut buf_writer = BufWriter::with_capacity(self.buffer_size, file);

        if is_new {
            buf_writer
                .write_all(UTF8_BOM)
                .map_err(|e| OutputError::IoError(format!("Failed to write BOM: {e}")))?;
        }

        // serialize() emits the header from field names on the first record
        let mut writer = WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(buf_writer);

        for tick in ticks {
            writer
                .serialize(TickRecord::from(tick))
                .map_err(|e| OutputError::CsvError(format!("Failed to write tick: {e}")))?;
        }

        writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))?;

        let buf_writer = writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {e}")))?;
        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {e}")))?;
        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;

        debug!(
            path = %self.path.display(),
            rows = ticks.len(),
            created = is_new,
            "Appended ticks"
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
