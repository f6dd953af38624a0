//! Table of tasks that are still running, keyed by task id.
//!
//! An id is present iff the most recent status observed for it is
//! non-terminal. Terminal statuses remove the entry; nothing is left stale.

use crate::model::ProgressInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of merging one progress update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableChange {
    Inserted,
    Updated,
    Removed,
    /// Terminal status for an id that was not running.
    Ignored,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressTable {
    entries: BTreeMap<String, ProgressInfo>,
}

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one update: remove on terminal status, otherwise upsert.
    pub fn apply(&mut self, progress: ProgressInfo) -> TableChange {
        if progress.status.is_terminal() {
            return match self.entries.remove(&progress.id) {
                Some(_) => TableChange::Removed,
                None => TableChange::Ignored,
            };
        }
        match self.entries.insert(progress.id.clone(), progress) {
            Some(_) => TableChange::Updated,
            None => TableChange::Inserted,
        }
    }

    /// Remove the given ids, returning how many were present.
    pub fn clear<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter(|id| self.entries.remove(id.as_ref()).is_some())
            .count()
    }

    pub fn get(&self, id: &str) -> Option<&ProgressInfo> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProgressInfo)> {
        self.entries.iter()
    }
}
