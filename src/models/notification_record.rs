use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use std::collections::BTreeSet;

use crate::models::{EventCategory, NotificationIdentity};

/// Persisted history entry; the snapshot is the last notified state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub identity: NotificationIdentity,
    pub attributes_snapshot: BTreeSet<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub notification_count: u32,
}

/// Raw `notifications` row. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub identity: String,
    pub source_unit_id: String,
    pub date: NaiveDate,
    pub subject_name: String,
    pub category: EventCategory,
    pub attributes: Json<BTreeSet<String>>,
    pub first_seen_at: i64,
    pub last_updated_at: i64,
    pub notification_count: i64,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            identity: NotificationIdentity {
                source_unit_id: row.source_unit_id,
                date: row.date,
                subject_name: row.subject_name,
                category: row.category,
            },
            attributes_snapshot: row.attributes.0,
            first_seen_at: from_millis(row.first_seen_at),
            last_updated_at: from_millis(row.last_updated_at),
            notification_count: u32::try_from(row.notification_count).unwrap_or(u32::MAX),
        }
    }
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Aggregate view over the notification history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStatistics {
    pub total_records: u64,
    pub by_category: Vec<(EventCategory, u64)>,
    pub upcoming_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let row = NotificationRow {
            identity: "lincoln-square|2025-11-06|Film Q&A|Q&A".to_string(),
            source_unit_id: "lincoln-square".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, 6).unwrap(),
            subject_name: "Film Q&A".to_string(),
            category: EventCategory::QuestionAndAnswer,
            attributes: Json(["7:00 PM".to_string()].into_iter().collect()),
            first_seen_at: 1_700_000_000_000,
            last_updated_at: 1_700_000_060_000,
            notification_count: 2,
        };

        let record = NotificationRecord::from(row);
        assert_eq!(record.identity.key(), "lincoln-square|2025-11-06|Film Q&A|Q&A");
        assert!(record.attributes_snapshot.contains("7:00 PM"));
        assert_eq!(record.notification_count, 2);
        assert_eq!((record.last_updated_at - record.first_seen_at).num_seconds(), 60);
    }
}
