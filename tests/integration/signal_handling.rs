//! Graceful shutdown of a running crawl

use std::sync::Arc;
use std::time::Duration;
use tick_data_downloader::downloader::{CrawlExecutor, PipelineSettings};
use tick_data_downloader::shutdown::ShutdownCoordinator;

use super::support::{range, tick, MemoryStore, ScriptedFetcher, INSTRUMENT};

#[tokio::test]
async fn test_shutdown_before_start_runs_nothing() {
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let fetcher = Arc::new(ScriptedFetcher::new().script(INSTRUMENT, vec![Ok(vec![tick(1)])]));

    let summary = CrawlExecutor::new(fetcher.clone(), Arc::new(MemoryStore::default()), range())
        .with_shutdown(shutdown)
        .run(vec![INSTRUMENT.to_string()])
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert!(fetcher.calls().is_empty());
    assert_eq!(summary.completed, 0);
}

#[tokio::test]
async fn test_in_flight_fetch_is_still_written() {
    let shutdown = ShutdownCoordinator::shared();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script("A", vec![Ok(vec![tick(1)])])
            .script("B", vec![Ok(vec![tick(2)])])
            .with_delay(Duration::from_millis(200)),
    );
    let store = Arc::new(MemoryStore::default());

    let executor = CrawlExecutor::new(fetcher.clone(), store.clone(), range())
        .with_settings(PipelineSettings::default().with_workers(1))
        .with_shutdown(shutdown.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request_shutdown();
    });

    let summary = executor
        .run(vec!["A".to_string(), "B".to_string()])
        .await
        .unwrap();
    trigger.await.unwrap();

    assert!(summary.interrupted);
    assert_eq!(fetcher.calls(), vec!["A"]);
    assert_eq!(store.batches(), vec![vec![tick(1)]]);
    assert_eq!((summary.completed, summary.total), (1, 2));
}
