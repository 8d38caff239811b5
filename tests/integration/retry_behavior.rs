//! Integration tests for retry priority demotion

use std::sync::Arc;
use std::time::Duration;
use tick_data_downloader::downloader::{CrawlExecutor, PipelineSettings};

use super::support::{network_error, range, tick, MemoryStore, ScriptedFetcher};

#[tokio::test]
async fn test_retried_task_yields_to_fresh_tasks() {
    // A single worker makes the fetch order equal to the queue order
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script("A", vec![Err(network_error()), Ok(vec![tick(1)])])
            .script("B", vec![Ok(vec![tick(2)])])
            .script("C", vec![Ok(vec![tick(3)])]),
    );
    let store = Arc::new(MemoryStore::default());

    let summary = CrawlExecutor::new(fetcher.clone(), store.clone(), range())
        .with_settings(PipelineSettings::default().with_workers(1))
        .run(vec!["A".to_string(), "B".to_string(), "C".to_string()])
        .await
        .unwrap();

    assert_eq!(fetcher.calls(), vec!["A", "B", "C", "A"]);
    assert_eq!(summary.completed, 3);
}

#[tokio::test]
async fn test_penalty_controls_requeue_position() {
    // Penalty 0 puts the retry behind equal-priority tasks only by insertion order
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script("A", vec![Err(network_error()), Ok(vec![tick(1)])])
            .script("B", vec![Ok(vec![tick(2)])]),
    );

    CrawlExecutor::new(fetcher.clone(), Arc::new(MemoryStore::default()), range())
        .with_settings(
            PipelineSettings::default()
                .with_workers(1)
                .with_retry_priority_penalty(0),
        )
        .run(vec!["A".to_string(), "B".to_string()])
        .await
        .unwrap();

    assert_eq!(fetcher.calls(), vec!["A", "B", "A"]);
}

#[tokio::test]
async fn test_single_attempt_limit_drops_on_first_failure() {
    let fetcher = Arc::new(
        ScriptedFetcher::new().script("A", vec![Err(network_error()), Ok(vec![tick(1)])]),
    );

    let summary = CrawlExecutor::new(fetcher.clone(), Arc::new(MemoryStore::default()), range())
        .with_settings(PipelineSettings::default().with_max_retries(1))
        .run(vec!["A".to_string()])
        .await
        .unwrap();

    assert_eq!(fetcher.call_count("A"), 1);
    assert_eq!(summary.dropped_tasks, 1);
}

#[tokio::test]
async fn test_worker_waiting_on_retry_does_not_exit() {
    // Worker 2 finds the queue empty while worker 1 still holds the task that
    // is about to be re-queued; it must wait instead of leaving the pool.
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script("A", vec![Err(network_error()), Err(network_error()), Ok(vec![tick(1)])])
            .with_delay(Duration::from_millis(50)),
    );

    let summary = CrawlExecutor::new(fetcher.clone(), Arc::new(MemoryStore::default()), range())
        .with_settings(
            PipelineSettings::default()
                .with_workers(2)
                .with_task_wait_timeout(Duration::from_millis(10)),
        )
        .run(vec!["A".to_string()])
        .await
        .unwrap();

    assert_eq!(fetcher.call_count("A"), 3);
    assert_eq!(summary.completed, 1);
}

#[tokio::test]
async fn test_huge_penalty_saturates_instead_of_overflowing() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .script("A", vec![Err(network_error()), Err(network_error()), Ok(vec![tick(1)])])
            .script("B", vec![Ok(vec![tick(2)])]),
    );

    let settings = PipelineSettings::default()
        .with_workers(1)
        .with_retry_priority_penalty(i64::MAX);
    assert!(settings.validate().is_ok());

    let summary = CrawlExecutor::new(fetcher.clone(), Arc::new(MemoryStore::default()), range())
        .with_settings(settings)
        .run(vec!["A".to_string(), "B".to_string()])
        .await
        .unwrap();

    // The demoted task stays behind the fresh one and keeps all its attempts
    assert_eq!(fetcher.calls(), vec!["A", "B", "A", "A"]);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.dropped_tasks, 0);
    assert_eq!(summary.failed_workers, 0);
}
