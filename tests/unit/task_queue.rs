//! Unit tests for the priority task queue and liveness tracker

use std::sync::Arc;
use std::time::Duration;
use tick_data_downloader::downloader::{LivenessTracker, PopOutcome, Task, TaskQueue};

const WAIT: Duration = Duration::from_millis(50);

async fn pop(queue: &TaskQueue) -> (i64, String) {
    match queue.pop(WAIT).await {
        PopOutcome::Task { priority, task } => (priority, task.to_string()),
        other => panic!("expected a task, got {other:?}"),
    }
}

#[tokio::test]
async fn test_equal_priority_pop_order_is_insertion_order() {
    let queue = TaskQueue::new();
    queue.push(0, Task::fetch_ticks("A"));
    queue.push(0, Task::fetch_ticks("B"));

    assert_eq!(pop(&queue).await.1, "fetch_ticks(A)");
    assert_eq!(pop(&queue).await.1, "fetch_ticks(B)");
}

#[tokio::test]
async fn test_retry_demotion_is_monotonic() {
    let queue = TaskQueue::new();
    queue.push(0, Task::fetch_ticks("A"));

    let mut last = i64::MIN;
    for _ in 0..3 {
        let (priority, task) = match queue.pop(WAIT).await {
            PopOutcome::Task { priority, task } => (priority, task),
            other => panic!("unexpected {other:?}"),
        };
        assert!(priority >= last);
        last = priority;
        queue.retry(priority + 2, task);
    }
    assert_eq!(pop(&queue).await.0, 6);
}

#[tokio::test]
async fn test_many_consumers_see_each_task_once() {
    let queue = Arc::new(TaskQueue::new());
    for i in 0..20 {
        queue.push(i % 3, Task::fetch_ticks(format!("T{i}")));
    }

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut seen = Vec::new();
                loop {
                    match queue.pop(WAIT).await {
                        PopOutcome::Task { task, .. } => {
                            seen.push(task.to_string());
                            queue.finish();
                        }
                        PopOutcome::Drained => break,
                        PopOutcome::TimedOut => {}
                    }
                }
                seen
            })
        })
        .collect();

    let mut all = Vec::new();
    for consumer in consumers {
        all.extend(consumer.await.unwrap());
    }
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 20);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_idle_only_after_every_guard_dropped() {
    let tracker = Arc::new(LivenessTracker::new());
    let guards: Vec<_> = (0..3).map(|_| tracker.register()).collect();
    assert_eq!(tracker.active_count(), 3);

    let waiter = {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move { tracker.wait_idle().await })
    };

    let mut guards = guards.into_iter();
    guards.next();
    guards.next();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(guards);
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(tracker.is_idle());
}
