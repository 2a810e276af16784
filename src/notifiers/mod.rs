use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::diff::DiffResult;
use crate::models::{CandidateItem, Classification};
use crate::Result;

pub mod discord;
pub mod dry_run;
pub mod format;
pub mod manager;
pub mod telegram;

pub use discord::DiscordNotifier;
pub use dry_run::DryRunNotifier;
pub use manager::NotifierManager;
pub use telegram::TelegramNotifier;

/// Everything a notifier needs to render one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub item: CandidateItem,
    pub diff: DiffResult,
}

impl NotificationEvent {
    pub fn new(item: &CandidateItem, diff: &DiffResult) -> Self {
        Self {
            item: item.clone(),
            diff: diff.clone(),
        }
    }

    pub fn is_update(&self) -> bool {
        self.diff.classification == Classification::Updated
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn sent(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// A delivery target (Telegram, Discord, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    fn notifier_type(&self) -> &str;

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult>;
    async fn test_connection(&self) -> Result<bool>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Delivers one notification for a new or updated item.
///
/// Success means every configured target accepted the message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, item: &CandidateItem, diff: &DiffResult) -> Result<()>;
}
