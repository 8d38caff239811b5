//! Unit tests for the kline response parser

use chrono::{FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use tick_data_downloader::fetcher::tick_parser::{normalize_field, TickParser};
use tick_data_downloader::fetcher::FetcherError;
use tick_data_downloader::DateRange;

const FIELDS: [&str; 7] = [
    "tick_at",
    "open_px",
    "close_px",
    "high_px",
    "low_px",
    "px_change",
    "px_change_rate",
];

fn range() -> DateRange {
    DateRange::parse_compact("20240101", "20240105").unwrap()
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[test]
fn test_field_normalization() {
    let normalized: Vec<_> = FIELDS.iter().map(|f| normalize_field(f)).collect();
    assert_eq!(
        normalized,
        vec!["date", "open", "close", "high", "low", "change", "change_rate"]
    );
    assert_eq!(normalize_field("volume"), "volume");
}

#[test]
fn test_parse_reordered_fields_and_string_cells() {
    // 2024-01-02T00:00:00Z and 2024-01-07T00:00:00Z (outside the range)
    let body = json!({
        "data": {
            "fields": ["close_px", "tick_at", "open_px", "high_px", "low_px", "px_change_rate", "px_change"],
            "candle": {
                "US10YR.OTC": {
                    "lines": [
                        ["3.94", 1704153600, 3.95, 3.97, 3.91, "-0.25", -0.01],
                        [3.90, 1704585600, 3.94, 3.95, 3.88, 0.1, 0.0]
                    ]
                }
            }
        }
    });

    let batch = TickParser::parse_kline(&body, "US10YR.OTC", utc(), &range()).unwrap();
    assert_eq!(batch.len(), 1);
    let tick = &batch[0];
    assert_eq!(
        tick.date,
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    );
    assert_eq!(tick.close, Decimal::from_str("3.94").unwrap());
    assert_eq!(tick.change_rate, Decimal::from_str("-0.25").unwrap());
}

#[test]
fn test_other_instrument_is_parse_error() {
    let body = json!({
        "data": {
            "fields": FIELDS,
            "candle": { "US2YR.OTC": { "lines": [] } }
        }
    });

    let err = TickParser::parse_kline(&body, "US10YR.OTC", utc(), &range()).unwrap_err();
    assert!(matches!(err, FetcherError::ParseError(_)));
    assert!(err.is_transient());
}

#[test]
fn test_error_envelope_is_parse_error() {
    let body = json!({ "code": 50001, "message": "internal error" });
    assert!(matches!(
        TickParser::parse_kline(&body, "US10YR.OTC", utc(), &range()),
        Err(FetcherError::ParseError(_))
    ));
}

#[test]
fn test_empty_lines_is_empty_batch() {
    let body = json!({
        "data": {
            "fields": FIELDS,
            "candle": { "US10YR.OTC": { "lines": [] } }
        }
    });
    assert!(TickParser::parse_kline(&body, "US10YR.OTC", utc(), &range())
        .unwrap()
        .is_empty());
}
