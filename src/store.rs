//! Durable notification history backed by SQLite.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::models::{EventCategory, NotificationIdentity, NotificationRecord, NotificationRow, StoreStatistics};
use crate::Result;

/// History of notified items, keyed by [`NotificationIdentity`].
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn lookup(&self, identity: &NotificationIdentity) -> Result<Option<NotificationRecord>>;

    /// Insert or replace the snapshot for `identity` in one atomic statement.
    async fn upsert(
        &self,
        identity: &NotificationIdentity,
        attributes: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove records whose `last_updated_at` is older than `now - retention`.
    async fn evict_older_than(&self, retention: chrono::Duration, now: DateTime<Utc>) -> Result<u64>;

    async fn statistics(&self, today: NaiveDate) -> Result<StoreStatistics>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect using a `sqlite:` URL, creating the file and its directory if needed.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        if let Some(parent) = database_path(url).as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Single-connection in-memory store; the database lives as long as the pool.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// File path named by a `sqlite:` URL, or `None` for in-memory databases.
fn database_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn lookup(&self, identity: &NotificationIdentity) -> Result<Option<NotificationRecord>> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT identity, source_unit_id, date, subject_name, category, attributes,
                   first_seen_at, last_updated_at, notification_count
            FROM notifications
            WHERE identity = ?
            "#,
        )
        .bind(identity.key())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(NotificationRecord::from))
    }

    async fn upsert(
        &self,
        identity: &NotificationIdentity,
        attributes: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let snapshot = serde_json::to_string(attributes)?;
        let now_ms = now.timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO notifications (
                identity, source_unit_id, date, subject_name, category, attributes,
                first_seen_at, last_updated_at, notification_count
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(identity) DO UPDATE SET
                attributes = excluded.attributes,
                last_updated_at = excluded.last_updated_at,
                notification_count = notifications.notification_count + 1
            "#,
        )
        .bind(identity.key())
        .bind(&identity.source_unit_id)
        .bind(identity.date)
        .bind(&identity.subject_name)
        .bind(identity.category)
        .bind(snapshot)
        .bind(now_ms)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        tracing::debug!(identity = %identity, "Stored notification snapshot");
        Ok(())
    }

    async fn evict_older_than(&self, retention: chrono::Duration, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = (now - retention).timestamp_millis();

        let result = sqlx::query("DELETE FROM notifications WHERE last_updated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn statistics(&self, today: NaiveDate) -> Result<StoreStatistics> {
        let total_records = self.count().await?;

        let by_category: Vec<(EventCategory, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM notifications GROUP BY category ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        let (upcoming,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE date >= ?")
            .bind(today)
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStatistics {
            total_records,
            by_category: by_category
                .into_iter()
                .map(|(category, count)| (category, count.max(0) as u64))
                .collect(),
            upcoming_records: upcoming.max(0) as u64,
        })
    }
}
