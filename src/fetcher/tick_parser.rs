//! Kline response parser
//!
//! Stateless conversion of the kline endpoint's JSON body into [`PriceTick`]s.
//!
//! # Format
//!
//! ```json
//! {
//!   "data": {
//!     "fields": ["tick_at", "open_px", "close_px", "high_px", "low_px", "px_change", "px_change_rate"],
//!     "candle": { "US10YR.OTC": { "lines": [[1704153600, 3.95, 3.94, 3.97, 3.91, 0.06, 1.54]] } }
//!   }
//! }
//! ```
//!
//! Field names lose their `px` marker (with adjacent underscores) and `tick_at`
//! becomes `date`. `tick_at` is epoch seconds, rendered in the instrument's zone.

use crate::fetcher::{FetcherError, FetcherResult};
use crate::{DateRange, PriceTick, RecordBatch};
use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

const TIMESTAMP_FIELD: &str = "tick_at";

/// Column positions resolved from the `fields` header
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    date: usize,
    open: usize,
    close: usize,
    high: usize,
    low: usize,
    change: usize,
    change_rate: usize,
    width: usize,
}

impl ColumnLayout {
    fn from_fields(fields: &[String]) -> FetcherResult<Self> {
        let find = |name: &str| {
            fields
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| FetcherError::ParseError(format!("Missing field '{name}'")))
        };

        Ok(Self {
            date: find("date")?,
            open: find("open")?,
            close: find("close")?,
            high: find("high")?,
            low: find("low")?,
            change: find("change")?,
            change_rate: find("change_rate")?,
            width: fields.len(),
        })
    }
}

/// Strip the `px` price marker and one adjacent underscore on each side.
///
/// `open_px` → `open`, `px_change_rate` → `change_rate`, `tick_at` is renamed to `date`.
pub fn normalize_field(name: &str) -> String {
    if name == TIMESTAMP_FIELD {
        return "date".to_string();
    }

    let mut out = name.to_string();
    while let Some(pos) = out.find("px") {
        let start = if pos > 0 && out.as_bytes()[pos - 1] == b'_' {
            pos - 1
        } else {
            pos
        };
        let mut end = pos + 2;
        if out.as_bytes().get(end) == Some(&b'_') {
            end += 1;
        }
        out.replace_range(start..end, "");
    }
    out
}

/// Stateless parser for kline responses
pub struct TickParser;

impl TickParser {
    /// Parse a kline body into ticks inside `range`
    ///
    /// # Errors
    /// - [`FetcherError::ParseError`] when keys are missing or cells are malformed
    /// - [`FetcherError::InvalidRecord`] when a timestamp cannot be represented or
    ///   the prices are inconsistent (high below low, open or close outside them)
    pub fn parse_kline(
        body: &Value,
        instrument: &str,
        offset: FixedOffset,
        range: &DateRange,
    ) -> FetcherResult<RecordBatch> {
        let data = body
            .get("data")
            .ok_or_else(|| FetcherError::ParseError("Missing 'data'".to_string()))?;

        let fields: Vec<String> = data
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| FetcherError::ParseError("Missing 'data.fields'".to_string()))?
            .iter()
            .map(|f| {
                f.as_str()
                    .map(normalize_field)
                    .ok_or_else(|| FetcherError::ParseError(format!("Field name is not a string: {f}")))
            })
            .collect::<FetcherResult<_>>()?;
        let layout = ColumnLayout::from_fields(&fields)?;

        let lines = data
            .get("candle")
            .and_then(|c| c.get(instrument))
            .and_then(|c| c.get("lines"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                FetcherError::ParseError(format!("Missing 'data.candle.{instrument}.lines'"))
            })?;

        let mut batch = Vec::with_capacity(lines.len());
        for line in lines {
            let tick = Self::parse_line(line, &layout, offset)?;
            if range.contains(&tick.date) {
                batch.push(tick);
            }
        }

        Ok(batch)
    }

    fn parse_line(line: &Value, layout: &ColumnLayout, offset: FixedOffset) -> FetcherResult<PriceTick> {
        let cells = line
            .as_array()
            .ok_or_else(|| FetcherError::ParseError("Kline line is not an array".to_string()))?;

        if cells.len() != layout.width {
            return Err(FetcherError::ParseError(format!(
                "Expected {} cells in line, got {}",
                layout.width,
                cells.len()
            )));
        }

        let tick = PriceTick {
            date: Self::parse_timestamp(&cells[layout.date], offset)?,
            open: Self::parse_decimal(&cells[layout.open], "open")?,
            close: Self::parse_decimal(&cells[layout.close], "close")?,
            high: Self::parse_decimal(&cells[layout.high], "high")?,
            low: Self::parse_decimal(&cells[layout.low], "low")?,
            change: Self::parse_decimal(&cells[layout.change], "change")?,
            change_rate: Self::parse_decimal(&cells[layout.change_rate], "change_rate")?,
        };

        tick.validate()
            .map_err(|e| FetcherError::InvalidRecord(format!("{} {e}", tick.date)))?;
        Ok(tick)
    }

    fn parse_timestamp(value: &Value, offset: FixedOffset) -> FetcherResult<NaiveDateTime> {
        let secs = value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| FetcherError::ParseError(format!("Invalid tick_at: {value}")))?;

        offset
            .timestamp_opt(secs, 0)
            .single()
            .map(|dt| dt.naive_local())
            .ok_or_else(|| FetcherError::InvalidRecord(format!("tick_at out of range: {secs}")))
    }

    fn parse_decimal(value: &Value, field: &str) -> FetcherResult<Decimal> {
        let parsed = match value {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string())),
            Value::String(s) => Decimal::from_str(s),
            _ => {
                return Err(FetcherError::ParseError(format!(
                    "Invalid {field}: {value}"
                )))
            }
        };

        parsed.map_err(|e| FetcherError::ParseError(format!("Invalid {field} '{value}': {e}")))
    }
}
