use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCounts {
    pub source_units_ok: usize,
    pub source_units_total: usize,
    pub items_found: usize,
    /// New and updated items delivered this run.
    pub sent: usize,
    /// Subset of `sent` that were updates.
    pub updated: usize,
    pub skipped: usize,
    pub dispatch_failed: usize,
}

/// Summary of one pipeline run, appended to the status sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStatus {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub outcome: RunOutcome,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub counts: RunCounts,
    pub error_summary: Option<String>,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// One-line summary used for the per-run log line.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "run {} {:?}: sources {}/{}, items {}, sent {} (updated {}), skipped {}, dispatch failures {}, {}ms",
            self.run_id.simple(),
            self.outcome,
            self.counts.source_units_ok,
            self.counts.source_units_total,
            self.counts.items_found,
            self.counts.sent,
            self.counts.updated,
            self.counts.skipped,
            self.counts.dispatch_failed,
            self.duration.as_millis()
        );
        if let Some(error) = &self.error_summary {
            line.push_str(": ");
            line.push_str(error);
        }
        line
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
