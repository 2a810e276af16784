use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use showtime_watcher::models::{
    Classification, EventCategory, NotificationIdentity, NotificationRecord, RunOutcome, StoreStatistics,
};
use showtime_watcher::shutdown::{self, Shutdown};
use showtime_watcher::store::{NotificationStore, SqliteStore};
use showtime_watcher::utils::error::{AppError, FetchError};

use super::*;

/// Every operation fails like a full disk.
struct BrokenStore;

#[async_trait]
impl NotificationStore for BrokenStore {
    async fn lookup(&self, _identity: &NotificationIdentity) -> showtime_watcher::Result<Option<NotificationRecord>> {
        Err(AppError::store("disk I/O error"))
    }

    async fn upsert(
        &self,
        _identity: &NotificationIdentity,
        _attributes: &BTreeSet<String>,
        _now: DateTime<Utc>,
    ) -> showtime_watcher::Result<()> {
        Err(AppError::store("disk I/O error"))
    }

    async fn evict_older_than(&self, _retention: chrono::Duration, _now: DateTime<Utc>) -> showtime_watcher::Result<u64> {
        Err(AppError::store("disk I/O error"))
    }

    async fn statistics(&self, _today: NaiveDate) -> showtime_watcher::Result<StoreStatistics> {
        Err(AppError::store("disk I/O error"))
    }
}

async fn setup() -> (Arc<ScriptedFetcher>, Arc<SqliteStore>, Arc<RecordingDispatcher>, showtime_watcher::Pipeline) {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = build_pipeline(fetcher.clone(), store.clone(), dispatcher.clone());
    (fetcher, store, dispatcher, pipeline)
}

#[tokio::test]
async fn test_new_item_notified_once() {
    let (fetcher, store, dispatcher, pipeline) = setup().await;
    fetcher.set("lincoln-square-13", Ok(listing(&[("Hamnet Q&A", &["7:00 PM", "7:30 PM"])])));

    let status = pipeline.run_once(&Shutdown::never()).await;

    assert!(status.is_success());
    assert_eq!(status.counts.items_found, 1);
    assert_eq!(status.counts.sent, 1);
    assert_eq!(status.counts.updated, 0);

    let delivered = dispatcher.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].classification, Classification::New);
    assert_eq!(delivered[0].added, vec!["7:00 PM".to_string(), "7:30 PM".to_string()]);
    assert!(delivered[0].identity.starts_with("lincoln-square-13|"));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_showtime_change_sends_update() {
    let (fetcher, store, dispatcher, pipeline) = setup().await;
    fetcher.set("empire-25", Ok(listing(&[("Hamnet Q&A", &["4:00 PM", "7:00 PM"])])));
    pipeline.run_once(&Shutdown::never()).await;
    dispatcher.clear();

    fetcher.set("empire-25", Ok(listing(&[("Hamnet Q&A", &["7:00 PM", "9:45 PM"])])));
    let status = pipeline.run_once(&Shutdown::never()).await;

    assert_eq!(status.counts.sent, 1);
    assert_eq!(status.counts.updated, 1);

    let delivered = dispatcher.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].classification, Classification::Updated);
    assert_eq!(delivered[0].added, vec!["9:45 PM".to_string()]);
    assert_eq!(delivered[0].removed, vec!["4:00 PM".to_string()]);

    let identity = NotificationIdentity {
        source_unit_id: "empire-25".to_string(),
        date: run_date(),
        subject_name: "Hamnet Q&A".to_string(),
        category: EventCategory::QuestionAndAnswer,
    };
    let record = store.lookup(&identity).await.unwrap().unwrap();
    assert_eq!(record.notification_count, 2);
    assert_eq!(record.identity.date, run_date());
}

#[tokio::test]
async fn test_unchanged_listing_is_idempotent() {
    let (fetcher, store, dispatcher, pipeline) = setup().await;
    fetcher.set("empire-25", Ok(listing(&[("Hamnet Q&A", &["7:00 PM"])])));

    pipeline.run_once(&Shutdown::never()).await;
    for _ in 0..3 {
        let status = pipeline.run_once(&Shutdown::never()).await;
        assert_eq!(status.counts.sent, 0);
        assert_eq!(status.counts.skipped, 1);
    }

    assert_eq!(dispatcher.delivered().len(), 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_dispatch_retried_next_run() {
    let (fetcher, store, dispatcher, pipeline) = setup().await;
    fetcher.set("empire-25", Ok(listing(&[("Hamnet Q&A", &["7:00 PM"])])));
    fetcher.set("lincoln-square-13", Ok(listing(&[("Bugonia Q&A", &["6:15 PM"])])));

    dispatcher.set_failing(true);
    let failed = pipeline.run_once(&Shutdown::never()).await;
    assert_eq!(failed.outcome, RunOutcome::Success);
    assert_eq!(failed.counts.dispatch_failed, 2);
    assert_eq!(failed.counts.sent, 0);
    assert_eq!(store.count().await.unwrap(), 0);

    dispatcher.set_failing(false);
    let recovered = pipeline.run_once(&Shutdown::never()).await;
    assert_eq!(recovered.counts.sent, 2);

    let delivered = dispatcher.delivered();
    assert_eq!(delivered.len(), 2);
    assert!(delivered.iter().all(|d| d.classification == Classification::New));
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_store_failure_fails_run() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let pipeline = build_pipeline(fetcher.clone(), Arc::new(BrokenStore), dispatcher.clone());
    fetcher.set("empire-25", Ok(listing(&[("Hamnet Q&A", &["7:00 PM"])])));

    let status = pipeline.run_once(&Shutdown::never()).await;

    assert_eq!(status.outcome, RunOutcome::Failed);
    assert!(status.error_summary.unwrap().contains("disk I/O error"));
    assert!(dispatcher.delivered().is_empty());
}

#[tokio::test]
async fn test_partial_fetch_failure_still_succeeds() {
    let (fetcher, _store, dispatcher, pipeline) = setup().await;
    fetcher.set("empire-25", Err(FetchError::Client(404)));
    fetcher.set("lincoln-square-13", Ok(listing(&[("Hamnet Q&A", &["7:00 PM"])])));

    let status = pipeline.run_once(&Shutdown::never()).await;

    assert!(status.is_success());
    assert_eq!(status.counts.source_units_ok, 1);
    assert_eq!(status.counts.source_units_total, 2);
    assert_eq!(dispatcher.delivered().len(), 1);
}

#[tokio::test]
async fn test_no_successful_fetch_fails_run() {
    let (fetcher, _store, dispatcher, pipeline) = setup().await;
    fetcher.set("empire-25", Err(FetchError::Client(403)));
    fetcher.set("lincoln-square-13", Err(FetchError::Malformed("bad id".to_string())));

    let status = pipeline.run_once(&Shutdown::never()).await;

    assert_eq!(status.outcome, RunOutcome::Failed);
    assert_eq!(status.counts.source_units_ok, 0);
    assert!(dispatcher.delivered().is_empty());
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_cancelled_before_fetch_reports_failure() {
    let (fetcher, _store, _dispatcher, pipeline) = setup().await;
    let (trigger, shutdown) = shutdown::channel();
    trigger.trigger();

    let status = pipeline.run_once(&shutdown).await;

    assert_eq!(status.outcome, RunOutcome::Failed);
    assert_eq!(fetcher.calls(), 0);
}
