use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

use super::format::{self, MessageStyle, TELEGRAM_MESSAGE_CHAR_LIMIT};
use super::{NotificationEvent, NotificationResult, Notifier};
use crate::config::TelegramConfig;
use crate::utils::error::AppError;
use crate::Result;

const SEND_MESSAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends MarkdownV2 messages through the Telegram Bot API to every configured chat.
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = Client::builder().timeout(SEND_MESSAGE_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    pub fn render(&self, event: &NotificationEvent) -> String {
        let message = format::render(event, MessageStyle::MarkdownV2);
        format::truncate(&message, TELEGRAM_MESSAGE_CHAR_LIMIT, MessageStyle::MarkdownV2)
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<Option<String>> {
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::dispatch(
                "telegram",
                format!("chat {} rejected message ({}): {}", chat_id, status, body),
            ));
        }

        let body: serde_json::Value = response.json().await?;
        Ok(body["result"]["message_id"].as_i64().map(|id| id.to_string()))
    }
}

#[derive(Debug, Default)]
struct Delivery {
    message_ids: Vec<String>,
    failures: Vec<String>,
}

/// Sends to every chat in order, sleeping `delay` between consecutive chats.
/// A failed chat does not stop delivery to the rest.
async fn deliver_to_all<F, Fut>(chat_ids: &[String], delay: Duration, mut send: F) -> Delivery
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    let mut delivery = Delivery::default();

    for (i, chat_id) in chat_ids.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match send(chat_id.clone()).await {
            Ok(id) => delivery.message_ids.extend(id),
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, "Telegram delivery failed: {}", e);
                delivery.failures.push(e.to_string());
            }
        }
    }

    delivery
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "Telegram Notifier"
    }

    fn notifier_type(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        let text = self.render(event);
        let text = text.as_str();

        let delivery = deliver_to_all(&self.config.chat_ids, self.config.send_delay(), move |chat_id| async move {
            self.send_message(&chat_id, text).await
        })
        .await;

        if !delivery.failures.is_empty() {
            return Ok(NotificationResult::failed(delivery.failures.join("; ")));
        }
        Ok(NotificationResult::sent(Some(delivery.message_ids.join(","))))
    }

    async fn test_connection(&self) -> Result<bool> {
        let response = self.client.get(self.endpoint("getMe")).send().await?;
        Ok(response.status().is_success())
    }
}
