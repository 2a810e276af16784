//! Merges out-of-order fetch results into one ordered report.

use std::collections::BTreeMap;

use crate::models::{AggregateReport, FetchResult, FetchTask, FetchTotals};
use crate::utils::error::FetchError;

/// Build a report with exactly one result per task, sorted by task.
///
/// Duplicate results for a task keep the first one seen; results for tasks
/// outside the set are dropped; tasks without a result become failures.
pub fn aggregate(tasks: &[FetchTask], results: Vec<FetchResult>) -> AggregateReport {
    let mut merged: BTreeMap<FetchTask, Option<FetchResult>> =
        tasks.iter().map(|task| (task.clone(), None)).collect();

    for result in results {
        match merged.get_mut(&result.task()) {
            Some(slot) if slot.is_none() => *slot = Some(result),
            Some(_) => {
                tracing::debug!(task = %result.task(), "Ignoring duplicate fetch result");
            }
            None => {
                tracing::warn!(task = %result.task(), "Ignoring result for unknown task");
            }
        }
    }

    let results: Vec<FetchResult> = merged
        .into_iter()
        .map(|(task, result)| {
            result.unwrap_or_else(|| {
                FetchResult::failure(&task, FetchError::Network("no result reported".to_string()), 0)
            })
        })
        .collect();

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let totals = FetchTotals {
        attempted: results.len(),
        succeeded,
        failed: results.len() - succeeded,
    };

    AggregateReport { results, totals }
}
