use chrono::{Duration, NaiveDate, Utc};
use std::collections::BTreeSet;
use tempfile::TempDir;

use showtime_watcher::models::{EventCategory, NotificationIdentity};
use showtime_watcher::store::{NotificationStore, SqliteStore};

fn identity(subject: &str) -> NotificationIdentity {
    NotificationIdentity {
        source_unit_id: "empire-25".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 11, 21).unwrap(),
        subject_name: subject.to_string(),
        category: EventCategory::QuestionAndAnswer,
    }
}

fn showtimes(times: &[&str]) -> BTreeSet<String> {
    times.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_records_survive_reopen() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("state").join("notifications.db");
    let url = format!("sqlite://{}", path.display());
    let now = Utc::now();

    {
        let store = SqliteStore::connect(&url, 2).await?;
        store.upsert(&identity("Wicked Q&A"), &showtimes(&["7:00 PM"]), now).await?;
        store.close().await;
    }

    let reopened = SqliteStore::connect(&url, 2).await?;
    let record = reopened
        .lookup(&identity("Wicked Q&A"))
        .await?
        .expect("record should persist across restarts");
    assert_eq!(record.attributes_snapshot, showtimes(&["7:00 PM"]));
    assert_eq!(record.notification_count, 1);
    reopened.close().await;
    Ok(())
}

#[tokio::test]
async fn test_retention_eviction() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let store = SqliteStore::open(&dir.path().join("notifications.db")).await?;
    let now = Utc::now();
    let window = Duration::days(30);

    store.upsert(&identity("Stale Q&A"), &showtimes(&["1:00 PM"]), now - Duration::days(45)).await?;
    store.upsert(&identity("Edge Q&A"), &showtimes(&["2:00 PM"]), now - Duration::days(29)).await?;
    store.upsert(&identity("Fresh Q&A"), &showtimes(&["3:00 PM"]), now).await?;

    let removed = store.evict_older_than(window, now).await?;
    assert_eq!(removed, 1);
    assert!(store.lookup(&identity("Stale Q&A")).await?.is_none());
    assert!(store.lookup(&identity("Edge Q&A")).await?.is_some());

    // A refreshed record is kept even if first seen long ago.
    store.upsert(&identity("Edge Q&A"), &showtimes(&["2:00 PM", "4:00 PM"]), now).await?;
    let removed = store.evict_older_than(window, now + Duration::days(5)).await?;
    assert_eq!(removed, 0);

    assert_eq!(store.evict_older_than(window, now).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_statistics_by_category() -> anyhow::Result<()> {
    let store = SqliteStore::in_memory().await?;
    let now = Utc::now();

    store.upsert(&identity("Wicked Q&A"), &showtimes(&["7:00 PM"]), now).await?;
    let mut fan = identity("Fan Event Marathon");
    fan.category = EventCategory::FanEvent;
    fan.date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
    store.upsert(&fan, &showtimes(&["6:00 PM"]), now).await?;

    let stats = store.statistics(NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()).await?;
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.upcoming_records, 1);
    assert_eq!(stats.by_category.len(), 2);
    Ok(())
}
