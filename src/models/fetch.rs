use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::FetchError;

/// One remote lookup: a source unit for a single day.
///
/// Ordering is by `(source_unit_id, time_window)`, which is also the order of
/// results in an [`AggregateReport`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTask {
    pub source_unit_id: String,
    pub time_window: NaiveDate,
}

impl FetchTask {
    pub fn new(source_unit_id: impl Into<String>, time_window: NaiveDate) -> Self {
        Self {
            source_unit_id: source_unit_id.into(),
            time_window,
        }
    }
}

impl fmt::Display for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source_unit_id, self.time_window)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FetchOutcome {
    Success { payload: String },
    Failure { error: FetchError },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchResult {
    pub source_unit_id: String,
    pub time_window: NaiveDate,
    #[serde(flatten)]
    pub outcome: FetchOutcome,
    pub attempt_count: u32,
}

impl FetchResult {
    pub fn success(task: &FetchTask, payload: String, attempt_count: u32) -> Self {
        Self {
            source_unit_id: task.source_unit_id.clone(),
            time_window: task.time_window,
            outcome: FetchOutcome::Success { payload },
            attempt_count,
        }
    }

    pub fn failure(task: &FetchTask, error: FetchError, attempt_count: u32) -> Self {
        Self {
            source_unit_id: task.source_unit_id.clone(),
            time_window: task.time_window,
            outcome: FetchOutcome::Failure { error },
            attempt_count,
        }
    }

    pub fn task(&self) -> FetchTask {
        FetchTask::new(self.source_unit_id.clone(), self.time_window)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success { payload } => Some(payload),
            FetchOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match &self.outcome {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Failure { error } => Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchTotals {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateReport {
    pub results: Vec<FetchResult>,
    pub totals: FetchTotals,
}

impl AggregateReport {
    pub fn successes(&self) -> impl Iterator<Item = &FetchResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    /// Distinct source units with at least one successful fetch.
    pub fn source_units_ok(&self) -> usize {
        let mut ok: Vec<&str> = self.successes().map(|r| r.source_unit_id.as_str()).collect();
        ok.dedup();
        ok.len()
    }

    pub fn source_units_total(&self) -> usize {
        let mut all: Vec<&str> = self.results.iter().map(|r| r.source_unit_id.as_str()).collect();
        all.dedup();
        all.len()
    }
}
