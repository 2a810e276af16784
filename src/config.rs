use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::models::EventCategory;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub fetch: FetchConfig,
    pub sources: Vec<SourceConfig>,
    pub scheduler: SchedulerConfig,
    pub retention: RetentionConfig,
    pub classifier: ClassifierConfig,
    pub notifications: NotificationsConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    #[validate(range(min = 1, max = 64))]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/notifications.db".to_string(),
            max_connections: 4,
        }
    }
}

/// Fetch worker pool and HTTP fetcher settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound on fetch tasks in flight at once.
    #[validate(range(min = 1, max = 64))]
    pub max_workers: usize,
    /// Fixed delay applied before every attempt.
    pub request_delay_ms: u64,
    /// Retries beyond the first attempt for transient failures.
    #[validate(range(max = 10))]
    pub max_retries: u32,
    /// Backoff between attempts; the last entry repeats.
    pub retry_delays_secs: Vec<u64>,
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Listing URL with `{source}` and `{date}` placeholders.
    pub url_template: String,
    #[validate(range(min = 1, max = 60))]
    pub days_ahead: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            request_delay_ms: 500,
            max_retries: 3,
            retry_delays_secs: vec![2, 5, 10],
            request_timeout_secs: 30,
            user_agent: "ShowtimeWatcher/0.1".to_string(),
            url_template: "http://localhost:8080/listings/{source}/{date}.json".to_string(),
            days_ahead: 7,
        }
    }
}

impl FetchConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_secs
            .iter()
            .map(|secs| Duration::from_secs(*secs))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SchedulerConfig {
    #[validate(range(min = 1))]
    pub run_interval_secs: u64,
    #[validate(range(min = 1))]
    pub cleanup_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_interval_secs: 15 * 60,
            cleanup_interval_secs: 24 * 60 * 60,
        }
    }
}

impl SchedulerConfig {
    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetentionConfig {
    #[validate(range(min = 1))]
    pub window_days: u32,
    #[validate(range(min = 1))]
    pub artifact_max_age_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            artifact_max_age_days: 7,
        }
    }
}

impl RetentionConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.window_days))
    }

    pub fn artifact_max_age(&self) -> Duration {
        Duration::from_secs(u64::from(self.artifact_max_age_days) * 24 * 60 * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Categories that produce candidates; everything else is dropped.
    pub categories: Vec<EventCategory>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            categories: vec![EventCategory::QuestionAndAnswer],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub telegram: Option<TelegramConfig>,
    pub discord: Option<DiscordConfig>,
    /// Log rendered messages instead of delivering them.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_ids: Vec<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Pause between consecutive chats, in milliseconds.
    #[serde(default = "default_telegram_send_delay_ms")]
    pub send_delay_ms: u64,
}

impl TelegramConfig {
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_send_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
    #[serde(default = "default_discord_username")]
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

fn default_discord_username() -> String {
    "Showtime Watcher".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub save_artifacts: bool,
    /// JSON Lines file receiving one status record per run.
    pub status_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            save_artifacts: true,
            status_file: Some(PathBuf::from("output/status.jsonl")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files; stdout only when unset.
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn load(base: &str) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name(base).required(false))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "SHOWTIME_"
            .add_source(
                Environment::with_prefix("SHOWTIME")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("fetch.retry_delays_secs")
                    .with_list_parse_key("classifier.categories"),
            )
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let range_checks = [
            self.database.validate(),
            self.fetch.validate(),
            self.scheduler.validate(),
            self.retention.validate(),
        ];
        for check in range_checks {
            check.map_err(|e| ConfigError::Message(format!("Invalid configuration: {}", e)))?;
        }

        // Validate fetch configuration
        if self.fetch.max_retries > 0 && self.fetch.retry_delays_secs.is_empty() {
            return Err(ConfigError::Message(
                "Fetch retry_delays_secs must not be empty when max_retries is set".into(),
            ));
        }

        if !self.fetch.url_template.contains("{source}") || !self.fetch.url_template.contains("{date}") {
            return Err(ConfigError::Message(
                "Fetch url_template must contain {source} and {date} placeholders".into(),
            ));
        }

        let sample = self
            .fetch
            .url_template
            .replace("{source}", "sample")
            .replace("{date}", "2000-01-01");
        if Url::parse(&sample).is_err() {
            return Err(ConfigError::Message("Invalid fetch url_template format".into()));
        }

        // Validate sources
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::Message("Source id must not be empty".into()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::Message(format!("Duplicate source id: {}", source.id)));
            }
        }

        // Validate scheduler configuration
        if self.scheduler.cleanup_interval_secs < self.scheduler.run_interval_secs {
            return Err(ConfigError::Message(
                "Scheduler cleanup_interval_secs cannot be shorter than run_interval_secs".into(),
            ));
        }

        // Validate notification configuration
        if let Some(telegram) = &self.notifications.telegram {
            if telegram.bot_token.trim().is_empty() {
                return Err(ConfigError::Message("Telegram bot_token must not be empty".into()));
            }
            if telegram.chat_ids.is_empty() {
                return Err(ConfigError::Message("Telegram chat_ids must not be empty".into()));
            }
        }

        if let Some(discord) = &self.notifications.discord {
            if Url::parse(&discord.webhook_url).is_err() {
                return Err(ConfigError::Message("Invalid Discord webhook URL format".into()));
            }
        }

        if self.classifier.categories.is_empty() {
            return Err(ConfigError::Message("Classifier categories must not be empty".into()));
        }

        Ok(())
    }

    /// Looks up the display name for a configured source id.
    pub fn source_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.as_str())
            .unwrap_or(id)
    }
}
