//! Fetch layer: task planning, the bounded worker pool and the HTTP fetcher.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::SourceConfig;
use crate::models::FetchTask;
use crate::utils::error::FetchError;

pub mod http;
pub mod pool;

pub use http::HttpFetcher;
pub use pool::{PoolSettings, WorkerPool};

/// Performs a single attempt for one task. Retries are the pool's job.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, task: &FetchTask) -> std::result::Result<String, FetchError>;
}

/// Running totals for one pool run, shared by all workers.
#[derive(Debug, Default)]
pub struct FetchStats {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    attempts: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct FetchStatsSnapshot {
    /// Tasks taken off the queue, including ones cancelled before their first request.
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Individual requests, including retries.
    pub attempts: u64,
}

impl FetchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_started(&self) {
        self.attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchStatsSnapshot {
        FetchStatsSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
        }
    }
}

/// One task per (source, day) for `days_ahead` days starting at `start`.
pub fn plan_tasks(sources: &[SourceConfig], start: NaiveDate, days_ahead: u32) -> Vec<FetchTask> {
    let mut tasks: Vec<FetchTask> = sources
        .iter()
        .flat_map(|source| {
            (0..days_ahead).map(move |offset| {
                FetchTask::new(source.id.clone(), start + Duration::days(i64::from(offset)))
            })
        })
        .collect();
    tasks.sort();
    tasks.dedup();
    tasks
}
