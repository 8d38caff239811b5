//! End-to-end runs of the crawl pipeline against a scripted fetcher

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tick_data_downloader::downloader::{CrawlExecutor, PipelineSettings};
use tick_data_downloader::fetcher::FetcherError;
use tick_data_downloader::output::csv::CsvTickStore;
use tick_data_downloader::output::TickStore;

use super::support::{
    csv_rows, network_error, range, tick, MemoryStore, RecordingProgress, ScriptedFetcher,
    INSTRUMENT,
};

fn settings() -> PipelineSettings {
    PipelineSettings::default().with_task_wait_timeout(Duration::from_millis(200))
}

#[tokio::test]
async fn test_new_rows_appended_and_finished_rows_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("us10yr.csv");
    let store = Arc::new(CsvTickStore::new(&path));
    store.append(&[tick(1)]).unwrap();

    let fetcher = Arc::new(
        ScriptedFetcher::new().script(INSTRUMENT, vec![Ok(vec![tick(1), tick(2), tick(3)])]),
    );
    let progress = Arc::new(RecordingProgress::default());

    let summary = CrawlExecutor::new(fetcher.clone(), store.clone(), range())
        .with_settings(settings())
        .with_progress(progress.clone())
        .run(vec![INSTRUMENT.to_string()])
        .await
        .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(summary.total, 1);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.empty_batches, 0);

    let rows = csv_rows(&path);
    assert_eq!(rows.len(), 3);
    assert!(rows[1].starts_with("2024-01-02 00:00:00,"));
    assert!(rows[2].starts_with("2024-01-03 00:00:00,"));
    assert_eq!(fetcher.call_count(INSTRUMENT), 1);

    let last = progress.updates().last().copied().unwrap();
    assert_eq!((last.completed, last.total), (1, 1));
}

#[tokio::test]
async fn test_retries_then_empty_result_lowers_total() {
    let fetcher = Arc::new(ScriptedFetcher::new().script(
        INSTRUMENT,
        vec![Err(network_error()), Err(network_error()), Ok(Vec::new())],
    ));
    let store = Arc::new(MemoryStore::default());

    let summary = CrawlExecutor::new(fetcher.clone(), store.clone(), range())
        .with_settings(settings().with_max_retries(3))
        .run(vec![INSTRUMENT.to_string()])
        .await
        .unwrap();

    assert_eq!(fetcher.call_count(INSTRUMENT), 3);
    assert_eq!(summary.total, 0);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.empty_batches, 1);
    assert_eq!(summary.dropped_tasks, 0);
    assert!(store.batches().is_empty());
}

#[tokio::test]
async fn test_task_dropped_after_max_retries() {
    let fetcher = Arc::new(ScriptedFetcher::new().script(
        INSTRUMENT,
        vec![
            Err(network_error()),
            Err(FetcherError::HttpError {
                status: 503,
                message: "busy".to_string(),
            }),
            Err(FetcherError::ParseError("missing data".to_string())),
            Ok(vec![tick(2)]),
        ],
    ));
    let store = Arc::new(MemoryStore::default());
    let progress = Arc::new(RecordingProgress::default());

    let summary = CrawlExecutor::new(fetcher.clone(), store.clone(), range())
        .with_settings(settings().with_max_retries(3))
        .with_progress(progress.clone())
        .run(vec![INSTRUMENT.to_string()])
        .await
        .unwrap();

    assert_eq!(fetcher.call_count(INSTRUMENT), 3);
    assert_eq!(summary.dropped_tasks, 1);
    assert_eq!((summary.completed, summary.total), (0, 1));
    assert!(store.batches().is_empty());
    assert!(progress
        .updates()
        .iter()
        .all(|s| s.completed == 0 && s.total == 1));
}

#[tokio::test]
async fn test_non_transient_error_stops_only_that_worker() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script(
                "BROKEN.OTC",
                vec![Err(FetcherError::InvalidRecord("timestamp out of range".to_string()))],
            )
            .script(INSTRUMENT, vec![Ok(vec![tick(2)])])
            .with_delay(Duration::from_millis(10)),
    );
    let store = Arc::new(MemoryStore::default());

    let summary = CrawlExecutor::new(fetcher.clone(), store.clone(), range())
        .with_settings(settings().with_workers(2))
        .run(vec!["BROKEN.OTC".to_string(), INSTRUMENT.to_string()])
        .await
        .unwrap();

    assert_eq!(summary.failed_workers, 1);
    assert_eq!(summary.dropped_tasks, 1);
    assert_eq!(fetcher.call_count("BROKEN.OTC"), 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(store.batches(), vec![vec![tick(2)]]);
}

#[tokio::test]
async fn test_writer_waits_for_slow_worker() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script(INSTRUMENT, vec![Ok(vec![tick(2)])])
            .with_delay(Duration::from_millis(300)),
    );
    let store = Arc::new(MemoryStore::default());

    let summary = CrawlExecutor::new(fetcher, store.clone(), range())
        .with_settings(settings().with_workers(3))
        .run(vec![INSTRUMENT.to_string()])
        .await
        .unwrap();

    assert_eq!(summary.completed, 1);
    assert_eq!(store.batches().len(), 1);
}

#[tokio::test]
async fn test_persistence_failure_stops_writer() {
    let fetcher = Arc::new(ScriptedFetcher::new().script(INSTRUMENT, vec![Ok(vec![tick(2)])]));
    let store = Arc::new(MemoryStore {
        fail_appends: true,
        ..MemoryStore::default()
    });

    let summary = CrawlExecutor::new(fetcher, store, range())
        .with_settings(settings())
        .run(vec![INSTRUMENT.to_string()])
        .await
        .unwrap();

    assert_eq!(summary.completed, 0);
    assert!(summary.writer_error.unwrap().contains("disk full"));
}

#[tokio::test]
async fn test_progress_never_exceeds_total() {
    let instruments: Vec<String> = (0..6).map(|i| format!("I{i}.OTC")).collect();
    let mut fetcher = ScriptedFetcher::new();
    for (i, instrument) in instruments.iter().enumerate() {
        let script = match i % 3 {
            0 => vec![Ok(vec![tick(1 + i as u32 % 4)])],
            1 => vec![Ok(Vec::new())],
            _ => vec![Err(network_error()), Ok(vec![tick(2)])],
        };
        fetcher = fetcher.script(instrument, script);
    }
    let progress = Arc::new(RecordingProgress::default());

    let summary = CrawlExecutor::new(
        Arc::new(fetcher),
        Arc::new(MemoryStore::default()),
        range(),
    )
    .with_settings(settings().with_workers(4))
    .with_progress(progress.clone())
    .run(instruments)
    .await
    .unwrap();

    assert_eq!((summary.completed, summary.total), (4, 4));
    assert!(progress
        .updates()
        .iter()
        .all(|s| s.completed <= s.total));
}

#[tokio::test]
async fn test_rejects_empty_seed() {
    let result = CrawlExecutor::new(
        Arc::new(ScriptedFetcher::new()),
        Arc::new(MemoryStore::default()),
        range(),
    )
    .run(Vec::new())
    .await;
    assert!(result.is_err());
}
