// crates/core/src/diff.rs
//! Pure comparison of the registry's known ids against the current snapshot.

use std::collections::BTreeSet;

use jobbot_types::{JobId, Snapshot};
use serde::Serialize;

/// Result of one comparison. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobDiff {
    /// In the snapshot, not yet known.
    pub new: Vec<JobId>,
    /// Known, gone from the snapshot.
    pub finished: Vec<JobId>,
    /// Every snapshot job in the running state, known or not.
    pub running: Vec<JobId>,
}

pub fn diff(known: &BTreeSet<JobId>, current: &Snapshot) -> JobDiff {
    JobDiff {
        new: new_jobs(known, current),
        finished: finished_jobs(known, current),
        running: running_jobs(current),
    }
}

pub fn new_jobs(known: &BTreeSet<JobId>, current: &Snapshot) -> Vec<JobId> {
    current
        .keys()
        .filter(|id| !known.contains(*id))
        .cloned()
        .collect()
}

pub fn finished_jobs(known: &BTreeSet<JobId>, current: &Snapshot) -> Vec<JobId> {
    known
        .iter()
        .filter(|id| !current.contains_key(*id))
        .cloned()
        .collect()
}

pub fn running_jobs(current: &Snapshot) -> Vec<JobId> {
    current
        .values()
        .filter(|record| record.is_running())
        .map(|record| record.id.clone())
        .collect()
}
