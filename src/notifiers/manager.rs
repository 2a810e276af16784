use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    Dispatcher, DiscordNotifier, DryRunNotifier, NotificationEvent, NotificationResult, Notifier,
    TelegramNotifier,
};
use crate::config::NotificationsConfig;
use crate::diff::DiffResult;
use crate::models::CandidateItem;
use crate::utils::error::AppError;
use crate::Result;

pub type NotifierBox = Box<dyn Notifier>;

/// Fans a notification out to every registered target.
#[derive(Clone)]
pub struct NotifierManager {
    notifiers: Arc<RwLock<BTreeMap<String, NotifierBox>>>,
}

impl NotifierManager {
    pub fn new() -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Build the targets named in `config`. Dry-run replaces real delivery.
    pub async fn from_config(config: &NotificationsConfig) -> Result<Self> {
        let manager = Self::new();

        if config.dry_run {
            manager.register(Box::new(DryRunNotifier::new())).await?;
            return Ok(manager);
        }

        if let Some(telegram) = &config.telegram {
            manager.register(Box::new(TelegramNotifier::new(telegram.clone())?)).await?;
        }
        if let Some(discord) = &config.discord {
            manager.register(Box::new(DiscordNotifier::new(discord.clone())?)).await?;
        }

        if manager.is_empty().await {
            tracing::warn!("No notification targets configured, falling back to dry run");
            manager.register(Box::new(DryRunNotifier::new())).await?;
        }

        Ok(manager)
    }

    /// Register a notifier, replacing any existing one of the same type
    pub async fn register(&self, notifier: NotifierBox) -> Result<()> {
        let notifier_type = notifier.notifier_type().to_string();
        tracing::info!("Registered notifier: {}", notifier.name());

        let mut notifiers = self.notifiers.write().await;
        notifiers.insert(notifier_type, notifier);
        Ok(())
    }

    pub async fn has_notifier(&self, notifier_type: &str) -> bool {
        let notifiers = self.notifiers.read().await;
        notifiers.contains_key(notifier_type)
    }

    pub async fn list_notifier_types(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().await;
        notifiers.keys().cloned().collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.notifiers.read().await.is_empty()
    }

    /// Check that every target is reachable. Failures are logged, never fatal.
    pub async fn check_connections(&self) -> BTreeMap<String, bool> {
        let notifiers = self.notifiers.read().await;
        let mut reachable = BTreeMap::new();

        for (notifier_type, notifier) in notifiers.iter() {
            let ok = match notifier.test_connection().await {
                Ok(true) => true,
                Ok(false) => {
                    tracing::warn!(target_type = %notifier_type, "{} rejected the connection check", notifier.name());
                    false
                }
                Err(e) => {
                    tracing::warn!(target_type = %notifier_type, "{} is unreachable: {}", notifier.name(), e);
                    false
                }
            };
            reachable.insert(notifier_type.clone(), ok);
        }

        reachable
    }

    /// Send to every target. Fails if any target fails; all targets are still attempted.
    pub async fn send_all(&self, event: &NotificationEvent) -> Result<()> {
        let notifiers = self.notifiers.read().await;
        if notifiers.is_empty() {
            return Err(AppError::dispatch("manager", "no notifiers registered"));
        }

        let mut failures = Vec::new();
        for (notifier_type, notifier) in notifiers.iter() {
            let outcome = match notifier.notify(event).await {
                Ok(result) => result,
                Err(e) => NotificationResult::failed(e.to_string()),
            };

            if outcome.success {
                metrics::counter!("notifications_sent_total", "target" => notifier_type.clone()).increment(1);
            } else {
                metrics::counter!("notifications_failed_total", "target" => notifier_type.clone()).increment(1);
                failures.push(format!(
                    "{}: {}",
                    notifier_type,
                    outcome.error.unwrap_or_else(|| "unknown error".to_string())
                ));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AppError::dispatch(
                event.diff.identity.key(),
                failures.join("; "),
            ))
        }
    }

    /// Shutdown all notifiers
    pub async fn shutdown(&self) -> Result<()> {
        let mut notifiers = self.notifiers.write().await;
        while let Some((_, notifier)) = notifiers.pop_first() {
            if let Err(e) = notifier.shutdown().await {
                tracing::warn!("Error shutting down notifier: {}", e);
            }
        }
        Ok(())
    }
}

impl Default for NotifierManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for NotifierManager {
    async fn dispatch(&self, item: &CandidateItem, diff: &DiffResult) -> Result<()> {
        self.send_all(&NotificationEvent::new(item, diff)).await
    }
}
