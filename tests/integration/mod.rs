// Integration tests for Showtime Watcher
// Shared fixtures: scripted fetchers, a recording dispatcher and pipeline builders.

pub mod fetch_pool_tests;
pub mod pipeline_tests;
pub mod scheduler_tests;
pub mod store_tests;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use showtime_watcher::classifier::KeywordClassifier;
use showtime_watcher::config::{ClassifierConfig, SourceConfig};
use showtime_watcher::diff::DiffResult;
use showtime_watcher::fetch::{Fetcher, PoolSettings, WorkerPool};
use showtime_watcher::models::{CandidateItem, Classification, FetchTask};
use showtime_watcher::notifiers::Dispatcher;
use showtime_watcher::store::NotificationStore;
use showtime_watcher::utils::error::{AppError, FetchError};
use showtime_watcher::Pipeline;

pub fn test_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            id: "empire-25".to_string(),
            name: "AMC Empire 25".to_string(),
        },
        SourceConfig {
            id: "lincoln-square-13".to_string(),
            name: "AMC Lincoln Square 13".to_string(),
        },
    ]
}

/// First day every integration pipeline plans from.
pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 6).expect("valid date")
}

pub fn pool_settings(max_workers: usize) -> PoolSettings {
    PoolSettings {
        max_workers,
        request_delay: Duration::ZERO,
        max_retries: 2,
        retry_delays: vec![Duration::from_millis(5)],
        attempt_timeout: Duration::from_secs(5),
    }
}

/// Listing JSON with one entry per (title, showtimes) pair.
pub fn listing(movies: &[(&str, &[&str])]) -> String {
    let movies: Vec<serde_json::Value> = movies
        .iter()
        .map(|(name, showtimes)| serde_json::json!({ "name": name, "showtimes": showtimes }))
        .collect();
    serde_json::json!({ "movies": movies }).to_string()
}

/// Serves a fixed payload per source unit, replaceable between runs.
#[derive(Default)]
pub struct ScriptedFetcher {
    payloads: Mutex<HashMap<String, Result<String, FetchError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set(&self, source_unit_id: &str, payload: Result<String, FetchError>) {
        self.payloads
            .lock()
            .unwrap()
            .insert(source_unit_id.to_string(), payload);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, task: &FetchTask) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.payloads
            .lock()
            .unwrap()
            .get(&task.source_unit_id)
            .cloned()
            .unwrap_or_else(|| Ok(listing(&[])))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivered {
    pub identity: String,
    pub classification: Classification,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Records every dispatch; can be switched to fail.
#[derive(Default)]
pub struct RecordingDispatcher {
    delivered: Mutex<Vec<Delivered>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.delivered.lock().unwrap().clear();
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, _item: &CandidateItem, diff: &DiffResult) -> showtime_watcher::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::dispatch("recorder", "target unavailable"));
        }
        self.delivered.lock().unwrap().push(Delivered {
            identity: diff.identity.key(),
            classification: diff.classification,
            added: diff.added.iter().cloned().collect(),
            removed: diff.removed.iter().cloned().collect(),
        });
        Ok(())
    }
}

/// Pipeline over the test sources, one day ahead from [`run_date`], Q&A only.
pub fn build_pipeline(
    fetcher: Arc<ScriptedFetcher>,
    store: Arc<dyn NotificationStore>,
    dispatcher: Arc<RecordingDispatcher>,
) -> Pipeline {
    let sources = test_sources();
    let classifier = KeywordClassifier::new(&ClassifierConfig::default(), &sources)
        .expect("classifier should build");
    Pipeline::new(
        WorkerPool::new(fetcher, pool_settings(2)),
        Arc::new(classifier),
        store,
        dispatcher,
        sources,
        1,
    )
    .with_start_date(run_date())
}

/// Helper to wait for async operations
pub async fn wait_for_condition<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
