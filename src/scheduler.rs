use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};

use crate::artifacts::ArtifactWriter;
use crate::config::{RetentionConfig, SchedulerConfig};
use crate::models::RunStatus;
use crate::pipeline::Pipeline;
use crate::retention::{self, CleanupReport};
use crate::shutdown::Shutdown;
use crate::status::StatusSink;
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub skipped_ticks: u64,
    pub cleanups: u64,
    pub average_run_time_ms: f64,
    pub last_status: Option<RunStatus>,
    pub uptime_seconds: u64,
}

/// What happened on a run tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Ran(RunStatus),
    /// A run was already in progress.
    Skipped,
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    sink: Arc<dyn StatusSink>,
    artifacts: Option<ArtifactWriter>,
    config: SchedulerConfig,
    retention: RetentionConfig,
    // Held for the whole of a run or cleanup.
    run_lock: Arc<Mutex<()>>,
    // Set while a cleanup is waiting for or holding `run_lock`.
    cleanup_pending: Arc<AtomicBool>,
    stats: Arc<RwLock<SchedulerStats>>,
    total_run_time_ms: Arc<RwLock<u128>>,
    start_time: DateTime<Utc>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        sink: Arc<dyn StatusSink>,
        config: SchedulerConfig,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            pipeline,
            sink,
            artifacts: None,
            config,
            retention,
            run_lock: Arc::new(Mutex::new(())),
            cleanup_pending: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            total_run_time_ms: Arc::new(RwLock::new(0)),
            start_time: Utc::now(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactWriter) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Run on the configured intervals until `shutdown` fires, then wait for the
    /// in-flight run to finish.
    pub async fn run(self: Arc<Self>, mut shutdown: Shutdown) -> SchedulerStats {
        let mut run_timer = interval(self.config.run_interval());
        run_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut cleanup_timer = interval(self.config.cleanup_interval());
        cleanup_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first cleanup happens one interval after startup.
        cleanup_timer.reset();

        tracing::info!(
            run_interval_secs = self.config.run_interval_secs,
            cleanup_interval_secs = self.config.cleanup_interval_secs,
            "Scheduler started"
        );

        let run_shutdown = shutdown.clone();
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, waiting for in-flight run");
                    break;
                }
                _ = run_timer.tick() => {
                    match Arc::clone(&self.run_lock).try_lock_owned() {
                        Ok(guard) => {
                            let this = Arc::clone(&self);
                            let run_shutdown = run_shutdown.clone();
                            tokio::spawn(async move {
                                this.execute_run(&run_shutdown).await;
                                drop(guard);
                            });
                        }
                        Err(_) => self.record_skip().await,
                    }
                }
                _ = cleanup_timer.tick() => {
                    if self.cleanup_pending.swap(true, Ordering::SeqCst) {
                        tracing::debug!("Retention cleanup already queued");
                        continue;
                    }
                    // Runs off the loop so a long run cannot stall run ticks or shutdown.
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = this.cleanup_tick().await {
                            tracing::error!("Retention cleanup failed: {}", e);
                        }
                        this.cleanup_pending.store(false, Ordering::SeqCst);
                    });
                }
            }
        }

        let _idle = self.run_lock.lock().await;
        tracing::info!("Scheduler stopped");
        self.get_stats().await
    }

    /// Run the pipeline now unless a run is already in progress.
    pub async fn tick(&self, shutdown: &Shutdown) -> TickOutcome {
        let Ok(_guard) = self.run_lock.try_lock() else {
            self.record_skip().await;
            return TickOutcome::Skipped;
        };
        TickOutcome::Ran(self.execute_run(shutdown).await)
    }

    /// Evict expired records and stale artifacts. Waits for any in-flight run.
    pub async fn cleanup_tick(&self) -> Result<CleanupReport> {
        let _guard = self.run_lock.lock().await;
        let report = retention::cleanup(
            self.pipeline.store().as_ref(),
            self.artifacts.as_ref(),
            &self.retention,
            Utc::now(),
        )
        .await?;

        self.stats.write().await.cleanups += 1;
        Ok(report)
    }

    async fn execute_run(&self, shutdown: &Shutdown) -> RunStatus {
        tracing::debug!("Starting scheduled run");
        let status = self.pipeline.run_once(shutdown).await;

        if let Err(e) = self.sink.record(&status).await {
            tracing::warn!("Failed to record run status: {}", e);
        }

        self.update_stats(&status).await;
        status
    }

    async fn record_skip(&self) {
        tracing::warn!("Previous run still in progress, skipping tick");
        metrics::counter!("scheduler_skipped_ticks_total").increment(1);
        self.stats.write().await.skipped_ticks += 1;
    }

    async fn update_stats(&self, status: &RunStatus) {
        let total_ms = {
            let mut total = self.total_run_time_ms.write().await;
            *total += status.duration.as_millis();
            *total
        };

        let mut stats = self.stats.write().await;
        stats.total_runs += 1;
        if status.is_success() {
            stats.successful_runs += 1;
        } else {
            stats.failed_runs += 1;
        }
        stats.average_run_time_ms = total_ms as f64 / stats.total_runs as f64;
        stats.last_status = Some(status.clone());
    }

    /// Get scheduler statistics
    pub async fn get_stats(&self) -> SchedulerStats {
        let mut stats = self.stats.read().await.clone();
        let uptime = Utc::now().signed_duration_since(self.start_time);
        stats.uptime_seconds = uptime.num_seconds().max(0) as u64;
        stats
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }
}
