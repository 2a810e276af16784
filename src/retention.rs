//! Retention cleanup: store eviction plus stale artifact removal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::SystemTime;

use crate::artifacts::ArtifactWriter;
use crate::config::RetentionConfig;
use crate::store::NotificationStore;
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub records_removed: u64,
    pub artifacts_removed: usize,
}

pub async fn cleanup(
    store: &dyn NotificationStore,
    artifacts: Option<&ArtifactWriter>,
    config: &RetentionConfig,
    now: DateTime<Utc>,
) -> Result<CleanupReport> {
    let records_removed = store.evict_older_than(config.window(), now).await?;

    // A failed artifact sweep does not undo eviction.
    let artifacts_removed = match artifacts {
        Some(writer) => match writer
            .remove_older_than(config.artifact_max_age(), SystemTime::from(now))
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(dir = %writer.dir().display(), "Artifact cleanup failed: {}", e);
                0
            }
        },
        None => 0,
    };

    tracing::info!(
        records_removed,
        artifacts_removed,
        window_days = config.window_days,
        "Retention cleanup complete"
    );

    Ok(CleanupReport {
        records_removed,
        artifacts_removed,
    })
}
