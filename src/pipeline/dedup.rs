//! Run-scoped deduplication of identity keys.
//!
//! Shared by every worker of a run. The check and the insert happen
//! under one lock so two workers can never both believe they are first.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Shared set of identity keys already written in each run.
#[derive(Debug, Default)]
pub struct RunDedupStore {
    seen: Mutex<HashMap<String, HashSet<String>>>,
}

impl RunDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically records `identity_key` for `run_id`, returning true
    /// when the key was already present (a duplicate).
    pub fn check_and_add(&self, run_id: &str, identity_key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        !seen
            .entry(run_id.to_string())
            .or_default()
            .insert(identity_key.to_string())
    }

    /// Drops a finished run's set.
    pub fn clear_run(&self, run_id: &str) {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.remove(run_id);
    }
}
