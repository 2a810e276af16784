//! Diff engine: classifies a candidate against its last notified snapshot.
//!
//! The engine never writes to the store. Callers commit the new snapshot
//! only after the notification for a `new` or `updated` item was delivered.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{CandidateItem, Classification, NotificationIdentity, NotificationRecord};
use crate::store::NotificationStore;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffResult {
    pub identity: NotificationIdentity,
    pub classification: Classification,
    /// Attributes present now but not in the snapshot.
    pub added: BTreeSet<String>,
    /// Attributes in the snapshot that are gone now.
    pub removed: BTreeSet<String>,
    pub retained: BTreeSet<String>,
}

impl DiffResult {
    /// Whether this result calls for a notification.
    pub fn needs_dispatch(&self) -> bool {
        self.classification != Classification::Unchanged
    }
}

/// Compare `item` against the optional prior record.
pub fn compute(item: &CandidateItem, prior: Option<&NotificationRecord>) -> DiffResult {
    let identity = item.identity();

    let Some(prior) = prior else {
        return DiffResult {
            identity,
            classification: Classification::New,
            added: item.attributes.clone(),
            removed: BTreeSet::new(),
            retained: BTreeSet::new(),
        };
    };

    let snapshot = &prior.attributes_snapshot;
    let added: BTreeSet<String> = item.attributes.difference(snapshot).cloned().collect();
    let removed: BTreeSet<String> = snapshot.difference(&item.attributes).cloned().collect();
    let retained: BTreeSet<String> = item.attributes.intersection(snapshot).cloned().collect();

    let classification = if added.is_empty() && removed.is_empty() {
        Classification::Unchanged
    } else {
        Classification::Updated
    };

    DiffResult {
        identity,
        classification,
        added,
        removed,
        retained,
    }
}

/// Look up the prior record and compute the diff.
pub async fn evaluate(store: &dyn NotificationStore, item: &CandidateItem) -> Result<DiffResult> {
    let prior = store.lookup(&item.identity()).await?;
    Ok(compute(item, prior.as_ref()))
}
