use async_trait::async_trait;

use super::format::{self, MessageStyle};
use super::{NotificationEvent, NotificationResult, Notifier};
use crate::Result;

/// Logs the rendered message instead of delivering it.
#[derive(Debug, Default)]
pub struct DryRunNotifier;

impl DryRunNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for DryRunNotifier {
    fn name(&self) -> &str {
        "Dry Run Notifier"
    }

    fn notifier_type(&self) -> &str {
        "dry_run"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        let message = format::render(event, MessageStyle::Plain);
        tracing::info!(identity = %event.diff.identity, "[dry run] would send:\n{}", message);
        Ok(NotificationResult::sent(None))
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(true)
    }
}
