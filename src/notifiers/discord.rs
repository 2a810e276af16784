use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;

use super::{NotificationEvent, NotificationResult, Notifier};
use crate::config::DiscordConfig;
use crate::models::Classification;
use crate::Result;

pub struct DiscordNotifier {
    client: Client,
    config: DiscordConfig,
}

impl DiscordNotifier {
    pub fn new(config: DiscordConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(DiscordNotifier { client, config })
    }

    fn get_embed_color(&self, classification: Classification) -> u32 {
        match classification {
            Classification::New => 0x00ff00,       // Green for new events
            Classification::Updated => 0xff9900,   // Orange for showtime changes
            Classification::Unchanged => 0x0099ff, // Blue for general updates
        }
    }

    fn get_emoji(&self, classification: Classification) -> &str {
        match classification {
            Classification::New => "🎬",
            Classification::Updated => "🔔",
            Classification::Unchanged => "📊",
        }
    }

    fn times_field(name: &str, times: &BTreeSet<String>) -> Option<serde_json::Value> {
        if times.is_empty() {
            return None;
        }
        let value: Vec<&str> = times.iter().map(String::as_str).collect();
        Some(json!({
            "name": name,
            "value": value.join("\n"),
            "inline": true
        }))
    }

    fn create_embed(&self, event: &NotificationEvent) -> serde_json::Value {
        let item = &event.item;
        let classification = event.diff.classification;
        let heading = if event.is_update() {
            format!("Updated {} Event", item.category)
        } else {
            format!("New {} Event!", item.category)
        };

        let mut fields = vec![
            json!({
                "name": "📍 Venue",
                "value": item.source_name,
                "inline": true
            }),
            json!({
                "name": "📅 Date",
                "value": item.date.format("%a %b %-d, %Y").to_string(),
                "inline": true
            }),
        ];

        if event.is_update() {
            fields.extend(Self::times_field("✅ New showtimes", &event.diff.added));
            fields.extend(Self::times_field("❌ Removed showtimes", &event.diff.removed));
            fields.extend(Self::times_field("📌 Still available", &event.diff.retained));
        } else {
            fields.extend(Self::times_field("⏰ Showtimes", &item.attributes));
        }

        let mut embed = json!({
            "title": format!("{} {}", self.get_emoji(classification), item.subject_name),
            "description": heading,
            "color": self.get_embed_color(classification),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "fields": fields,
        });

        if item.runtime_minutes.is_some() || item.rating.is_some() {
            let runtime = item.runtime_minutes.map(|m| format!("{}min", m)).unwrap_or_default();
            let rating = item.rating.as_deref().map(|r| format!("[{}]", r)).unwrap_or_default();
            embed["footer"] = json!({ "text": format!("{} {}", runtime, rating).trim() });
        }

        embed
    }

    fn create_webhook_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        let mut payload = json!({
            "username": self.config.username,
            "embeds": [self.create_embed(event)]
        });

        if let Some(avatar_url) = &self.config.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }

        payload
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn notifier_type(&self) -> &str {
        "discord"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult> {
        let payload = self.create_webhook_payload(event);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(NotificationResult::sent(None))
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Discord webhook rejected message ({}): {}", status, body);
            Ok(NotificationResult::failed(format!("webhook returned {}", status)))
        }
    }

    async fn test_connection(&self) -> Result<bool> {
        // GET on a webhook URL returns its metadata without posting.
        let response = self.client.get(&self.config.webhook_url).send().await?;
        Ok(response.status().is_success())
    }
}
