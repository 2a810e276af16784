use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::models::EventCategory;

/// A detected item of interest, e.g. a Q&A screening on a given day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub source_unit_id: String,
    pub source_name: String,
    pub date: NaiveDate,
    pub subject_name: String,
    pub occurrence_key: String,
    /// Showtimes currently listed for this item.
    pub attributes: BTreeSet<String>,
    pub category: EventCategory,
    pub runtime_minutes: Option<u32>,
    pub rating: Option<String>,
}

impl CandidateItem {
    pub fn identity(&self) -> NotificationIdentity {
        NotificationIdentity {
            source_unit_id: self.source_unit_id.clone(),
            date: self.date,
            subject_name: self.subject_name.clone(),
            category: self.category,
        }
    }
}

/// Stable key of a notified item. Attribute changes never change the identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NotificationIdentity {
    pub source_unit_id: String,
    pub date: NaiveDate,
    pub subject_name: String,
    pub category: EventCategory,
}

impl NotificationIdentity {
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.source_unit_id,
            self.date.format("%Y-%m-%d"),
            self.subject_name,
            self.category.label()
        )
    }
}

impl fmt::Display for NotificationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
