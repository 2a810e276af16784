//! One pass of fetch → classify → diff → notify → persist.

use chrono::{Local, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::aggregator::aggregate;
use crate::artifacts::ArtifactWriter;
use crate::classifier::{Classifier, KeywordClassifier};
use crate::config::{AppConfig, SourceConfig};
use crate::diff::{self, DiffResult};
use crate::fetch::{plan_tasks, FetchStats, Fetcher, HttpFetcher, PoolSettings, WorkerPool};
use crate::models::{AggregateReport, CandidateItem, Classification, RunCounts, RunOutcome, RunStatus};
use crate::notifiers::Dispatcher;
use crate::shutdown::Shutdown;
use crate::store::NotificationStore;
use crate::utils::error::{AppError, ErrorPolicy};
use crate::Result;

pub struct Pipeline {
    pool: WorkerPool,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn NotificationStore>,
    dispatcher: Arc<dyn Dispatcher>,
    artifacts: Option<ArtifactWriter>,
    sources: Vec<SourceConfig>,
    days_ahead: u32,
    // Local today when unset.
    start_date: Option<NaiveDate>,
}

impl Pipeline {
    pub fn new(
        pool: WorkerPool,
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn NotificationStore>,
        dispatcher: Arc<dyn Dispatcher>,
        sources: Vec<SourceConfig>,
        days_ahead: u32,
    ) -> Self {
        Self {
            pool,
            classifier,
            store,
            dispatcher,
            artifacts: None,
            sources,
            days_ahead,
            start_date: None,
        }
    }

    /// Wire the HTTP fetcher and keyword classifier from configuration.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn NotificationStore>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
        let pool = WorkerPool::new(fetcher, PoolSettings::from(&config.fetch));
        let classifier = Arc::new(KeywordClassifier::new(&config.classifier, &config.sources)?);

        let pipeline = Self::new(
            pool,
            classifier,
            store,
            dispatcher,
            config.sources.clone(),
            config.fetch.days_ahead,
        );

        Ok(if config.output.save_artifacts {
            pipeline.with_artifacts(ArtifactWriter::new(&config.output.dir))
        } else {
            pipeline
        })
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactWriter) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Plan every run from `date` instead of the local calendar day.
    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// Run the pipeline once. Failures are reported in the status, never returned.
    pub async fn run_once(&self, shutdown: &Shutdown) -> RunStatus {
        let run_id = Uuid::new_v4();
        let timestamp = Utc::now();
        let started = Instant::now();
        let mut counts = RunCounts::default();

        let span = tracing::info_span!("run", run_id = %run_id.simple());
        let result = self.execute(shutdown, &mut counts).instrument(span).await;

        let duration = started.elapsed();
        metrics::histogram!("run_duration_seconds").record(duration.as_secs_f64());

        let (outcome, error_summary) = match result {
            Ok(()) => (RunOutcome::Success, None),
            Err(e) => {
                metrics::counter!("runs_failed_total").increment(1);
                (RunOutcome::Failed, Some(e.to_string()))
            }
        };

        RunStatus {
            run_id,
            timestamp,
            outcome,
            duration,
            counts,
            error_summary,
        }
    }

    async fn execute(&self, shutdown: &Shutdown, counts: &mut RunCounts) -> Result<()> {
        let today = self.start_date();
        let report = self.fetch(today, shutdown).await;
        counts.source_units_ok = report.source_units_ok();
        counts.source_units_total = report.source_units_total();

        if report.totals.attempted > 0 && report.totals.succeeded == 0 {
            return Err(AppError::NothingFetched {
                failed: report.totals.failed,
                total: report.totals.attempted,
            });
        }

        let items = self.classifier.classify(&report);
        counts.items_found = items.len();
        self.save_candidates(&items).await;

        for item in &items {
            let diff = diff::evaluate(self.store.as_ref(), item).await?;

            if !diff.needs_dispatch() {
                counts.skipped += 1;
                debug!(identity = %diff.identity, "Already notified, skipping");
                continue;
            }

            match self.deliver(item, &diff).await {
                Ok(()) => {
                    counts.sent += 1;
                    if diff.classification == Classification::Updated {
                        counts.updated += 1;
                    }
                }
                Err(e) if e.policy() == ErrorPolicy::AbortRun => return Err(e),
                Err(e) => {
                    counts.dispatch_failed += 1;
                    warn!(identity = %diff.identity, "Notification not delivered, will retry next run: {}", e);
                }
            }
        }

        match self.store.statistics(today).await {
            Ok(stats) => info!(
                total = stats.total_records,
                upcoming = stats.upcoming_records,
                "Notification history"
            ),
            Err(e) => warn!("Could not read store statistics: {}", e),
        }

        Ok(())
    }

    async fn fetch(&self, today: NaiveDate, shutdown: &Shutdown) -> AggregateReport {
        let tasks = plan_tasks(&self.sources, today, self.days_ahead);
        let stats = FetchStats::new();
        let results = self.pool.run(tasks.clone(), &stats, shutdown).await;
        let report = aggregate(&tasks, results);

        let snapshot = stats.snapshot();
        info!(
            succeeded = report.totals.succeeded,
            failed = report.totals.failed,
            requests = snapshot.attempts,
            "Fetch complete"
        );

        if let Some(artifacts) = &self.artifacts {
            if let Err(e) = artifacts.save_report(Utc::now(), &report).await {
                warn!("Failed to save fetch artifact: {}", e);
            }
        }

        report
    }

    async fn save_candidates(&self, items: &[CandidateItem]) {
        if let Some(artifacts) = &self.artifacts {
            if let Err(e) = artifacts.save_candidates(Utc::now(), items).await {
                warn!("Failed to save candidates artifact: {}", e);
            }
        }
    }

    /// Dispatch, then commit the snapshot only if every target succeeded.
    async fn deliver(&self, item: &CandidateItem, diff: &DiffResult) -> Result<()> {
        self.dispatcher.dispatch(item, diff).await?;
        metrics::counter!("dispatches_total", "kind" => classification_label(diff.classification)).increment(1);
        self.store.upsert(&diff.identity, &item.attributes, Utc::now()).await?;
        info!(identity = %diff.identity, classification = ?diff.classification, "Notified");
        Ok(())
    }
}

fn classification_label(classification: Classification) -> &'static str {
    match classification {
        Classification::New => "new",
        Classification::Updated => "updated",
        Classification::Unchanged => "unchanged",
    }
}
