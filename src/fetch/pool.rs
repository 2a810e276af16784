use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

use super::{FetchStats, Fetcher};
use crate::config::FetchConfig;
use crate::models::{FetchResult, FetchTask};
use crate::shutdown::Shutdown;
use crate::utils::error::{ErrorPolicy, FetchError};

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_workers: usize,
    pub request_delay: Duration,
    pub max_retries: u32,
    pub retry_delays: Vec<Duration>,
    pub attempt_timeout: Duration,
}

impl From<&FetchConfig> for PoolSettings {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            request_delay: config.request_delay(),
            max_retries: config.max_retries,
            retry_delays: config.retry_delays(),
            attempt_timeout: config.request_timeout(),
        }
    }
}

impl PoolSettings {
    /// Delays before each retry. The last configured delay repeats.
    pub fn retry_schedule(&self) -> Vec<Duration> {
        let last = self.retry_delays.last().copied().unwrap_or(Duration::ZERO);
        self.retry_delays
            .iter()
            .copied()
            .chain(std::iter::repeat(last))
            .take(self.max_retries as usize)
            .collect()
    }

    /// Extra wait after a rate-limited attempt.
    pub fn rate_limit_cooldown(&self) -> Duration {
        self.retry_delays.last().copied().unwrap_or(Duration::ZERO)
    }
}

/// Runs fetch tasks with at most `max_workers` in flight.
pub struct WorkerPool {
    fetcher: Arc<dyn Fetcher>,
    settings: PoolSettings,
}

impl WorkerPool {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: PoolSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Execute every task and return exactly one result per task, in completion order.
    ///
    /// Tasks not yet started when `shutdown` fires are reported as
    /// [`FetchError::Cancelled`] with zero attempts.
    pub async fn run(&self, tasks: Vec<FetchTask>, stats: &FetchStats, shutdown: &Shutdown) -> Vec<FetchResult> {
        let workers = self.settings.max_workers.max(1);
        info!(tasks = tasks.len(), workers, "Starting fetch");

        stream::iter(tasks)
            .map(|task| async move {
                if shutdown.is_cancelled() {
                    stats.record_started();
                    stats.record_failure();
                    return FetchResult::failure(&task, FetchError::Cancelled, 0);
                }
                self.execute(task, stats, shutdown).await
            })
            .buffer_unordered(workers)
            .collect()
            .await
    }

    async fn execute(&self, task: FetchTask, stats: &FetchStats, shutdown: &Shutdown) -> FetchResult {
        stats.record_started();
        let attempts = AtomicU32::new(0);
        let rate_limited = AtomicBool::new(false);

        let outcome = RetryIf::spawn(
            self.settings.retry_schedule(),
            || self.attempt(&task, &attempts, &rate_limited, stats),
            // No new attempts once shutdown is requested.
            |err: &FetchError| err.kind().policy() == ErrorPolicy::Retry && !shutdown.is_cancelled(),
        )
        .await;

        let attempt_count = attempts.load(Ordering::SeqCst);
        match outcome {
            Ok(payload) => {
                stats.record_success();
                debug!(source_unit = %task.source_unit_id, date = %task.time_window, attempts = attempt_count, "Fetch succeeded");
                FetchResult::success(&task, payload, attempt_count)
            }
            Err(error) => {
                stats.record_failure();
                warn!(
                    source_unit = %task.source_unit_id,
                    date = %task.time_window,
                    attempts = attempt_count,
                    "Fetch failed: {}", error
                );
                FetchResult::failure(&task, error, attempt_count)
            }
        }
    }

    async fn attempt(
        &self,
        task: &FetchTask,
        attempts: &AtomicU32,
        rate_limited: &AtomicBool,
        stats: &FetchStats,
    ) -> std::result::Result<String, FetchError> {
        if rate_limited.swap(false, Ordering::SeqCst) {
            let cooldown = self.settings.rate_limit_cooldown();
            warn!(source_unit = %task.source_unit_id, "Rate limited, cooling down for {:?}", cooldown);
            tokio::time::sleep(cooldown).await;
        }

        if !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }

        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        stats.record_attempt();
        metrics::counter!("fetch_attempts_total").increment(1);
        debug!(source_unit = %task.source_unit_id, date = %task.time_window, attempt, "Fetching");

        let result = match tokio::time::timeout(self.settings.attempt_timeout, self.fetcher.fetch(task)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(format!(
                "no response within {}s",
                self.settings.attempt_timeout.as_secs_f64()
            ))),
        };

        if let Err(err) = &result {
            if *err == FetchError::RateLimited {
                rate_limited.store(true, Ordering::SeqCst);
            }
            metrics::counter!("fetch_failures_total", "kind" => err.label()).increment(1);
            debug!(source_unit = %task.source_unit_id, attempt, "Attempt failed: {}", err);
        }

        result
    }
}
