use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rstest::rstest;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use showtime_watcher::aggregator::aggregate;
use showtime_watcher::config::SourceConfig;
use showtime_watcher::fetch::{plan_tasks, FetchStats, Fetcher, WorkerPool};
use showtime_watcher::models::{AggregateReport, FetchTask};
use showtime_watcher::shutdown::Shutdown;
use showtime_watcher::utils::error::FetchError;

use super::pool_settings;

/// First attempt against `flaky` fails with a 503; `gone` is always a 404.
#[derive(Default)]
struct FlakyFetcher {
    attempts: Mutex<HashMap<FetchTask, u32>>,
}

#[async_trait]
impl Fetcher for FlakyFetcher {
    async fn fetch(&self, task: &FetchTask) -> Result<String, FetchError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(task.clone()).or_insert(0);
            *n += 1;
            *n
        };

        // Uneven latency so completion order differs from submission order.
        let jitter = u64::from((task.time_window.day() * 7 + task.source_unit_id.len() as u32) % 4);
        tokio::time::sleep(Duration::from_millis(jitter * 3)).await;

        match task.source_unit_id.as_str() {
            "gone" => Err(FetchError::Client(404)),
            "flaky" if attempt == 1 => Err(FetchError::Server(503)),
            _ => Ok(format!("listing for {}", task)),
        }
    }
}

fn sources() -> Vec<SourceConfig> {
    ["alpha", "flaky", "gone", "zeta"]
        .iter()
        .map(|id| SourceConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
        })
        .collect()
}

async fn run_with(max_workers: usize) -> (AggregateReport, FetchStats) {
    let start = NaiveDate::from_ymd_opt(2025, 11, 6).unwrap();
    let tasks = plan_tasks(&sources(), start, 3);
    let pool = WorkerPool::new(Arc::new(FlakyFetcher::default()), pool_settings(max_workers));
    let stats = FetchStats::new();

    let results = pool.run(tasks.clone(), &stats, &Shutdown::never()).await;
    assert_eq!(results.len(), tasks.len());
    (aggregate(&tasks, results), stats)
}

#[rstest]
#[case(1)]
#[case(4)]
#[tokio::test]
async fn test_report_shape_independent_of_concurrency(#[case] max_workers: usize) {
    let (report, stats) = run_with(max_workers).await;

    assert_eq!(report.totals.attempted, 12);
    assert_eq!(report.totals.succeeded, 9);
    assert_eq!(report.totals.failed, 3);
    assert_eq!(report.source_units_total(), 4);
    assert_eq!(report.source_units_ok(), 3);

    let order: Vec<(String, NaiveDate)> = report
        .results
        .iter()
        .map(|r| (r.source_unit_id.clone(), r.time_window))
        .collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);

    let flaky = report.results.iter().find(|r| r.source_unit_id == "flaky").unwrap();
    assert!(flaky.is_success());
    assert_eq!(flaky.attempt_count, 2);

    let gone = report.results.iter().find(|r| r.source_unit_id == "gone").unwrap();
    assert_eq!(gone.error(), Some(&FetchError::Client(404)));
    assert_eq!(gone.attempt_count, 1);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.succeeded, 9);
    assert_eq!(snapshot.failed, 3);
    // 12 first attempts plus one retry per flaky task.
    assert_eq!(snapshot.attempts, 15);
}

#[tokio::test]
async fn test_serial_and_parallel_reports_match() {
    let (serial, _) = run_with(1).await;
    let (parallel, _) = run_with(4).await;
    assert_eq!(serial, parallel);
}
