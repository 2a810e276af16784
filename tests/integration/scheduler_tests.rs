use std::sync::Arc;
use std::time::Duration;

use showtime_watcher::config::{RetentionConfig, SchedulerConfig};
use showtime_watcher::scheduler::{Scheduler, TickOutcome};
use showtime_watcher::shutdown::{self, Shutdown};
use showtime_watcher::status::MemoryStatusSink;
use showtime_watcher::store::SqliteStore;

use super::*;

async fn create_test_scheduler(
    fetch_delay: Duration,
    run_interval_secs: u64,
) -> (Arc<Scheduler>, Arc<MemoryStatusSink>, Arc<RecordingDispatcher>, Arc<ScriptedFetcher>) {
    let fetcher = Arc::new(ScriptedFetcher::with_delay(fetch_delay));
    fetcher.set("empire-25", Ok(listing(&[("Hamnet Q&A", &["7:00 PM"])])));

    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = build_pipeline(fetcher.clone(), store, dispatcher.clone());

    let sink = Arc::new(MemoryStatusSink::new());
    let scheduler = Scheduler::new(
        Arc::new(pipeline),
        sink.clone(),
        SchedulerConfig {
            run_interval_secs,
            cleanup_interval_secs: 3600,
        },
        RetentionConfig::default(),
    );
    (Arc::new(scheduler), sink, dispatcher, fetcher)
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped() {
    let (scheduler, sink, dispatcher, _fetcher) = create_test_scheduler(Duration::from_millis(300), 60).await;

    let first = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.tick(&Shutdown::never()).await })
    };

    assert!(wait_for_condition(|| scheduler.is_running(), Duration::from_secs(2)).await);
    let second = scheduler.tick(&Shutdown::never()).await;
    assert!(matches!(second, TickOutcome::Skipped));

    let first = first.await.unwrap();
    assert!(matches!(first, TickOutcome::Ran(ref status) if status.is_success()));

    let stats = scheduler.get_stats().await;
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.skipped_ticks, 1);
    assert_eq!(sink.statuses().len(), 1);
    assert_eq!(dispatcher.delivered().len(), 1);
}

#[tokio::test]
async fn test_shutdown_finishes_in_flight_run() {
    let (scheduler, sink, dispatcher, fetcher) = create_test_scheduler(Duration::from_millis(300), 3600).await;
    let (trigger, shutdown) = shutdown::channel();

    let handle = tokio::spawn(Arc::clone(&scheduler).run(shutdown));

    // The first tick fires immediately; stop while it is still fetching.
    assert!(wait_for_condition(|| fetcher.calls() == 2, Duration::from_secs(2)).await);
    trigger.trigger();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler should stop")
        .unwrap();

    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.successful_runs, 1);
    assert_eq!(sink.statuses().len(), 1);
    assert_eq!(dispatcher.delivered().len(), 1);
    assert!(!scheduler.is_running());
}
