//! Target and source drift detection.
//!
//! Per target: a consecutive-failure threshold decides when a target
//! transitions Active → Broken. Per source: a sliding window counts
//! block-class failures (robots denial, 429-class responses, detected
//! blocking); reaching the threshold inside the window flips the
//! source's compliance flag off. Both thresholds come from
//! configuration, never code.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Drift thresholds, sourced from `ScrapeConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Consecutive failures before a target is marked broken.
    pub broken_after_failures: u32,
    /// Block-class failures inside the window before a source is
    /// auto-disabled.
    pub block_threshold: u32,
    /// Sliding window length in seconds.
    pub block_window_secs: u64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            broken_after_failures: 5,
            block_threshold: 3,
            block_window_secs: 300,
        }
    }
}

/// What the detector decided after a recorded block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDecision {
    /// Below threshold; keep fetching.
    WithinTolerance,
    /// Threshold reached; the source should be disabled now.
    DisableSource,
}

/// Sliding-window block tracking per source, plus the target threshold
/// rule. Timestamps are passed in by the caller so tests drive a
/// deterministic clock.
#[derive(Debug)]
pub struct DriftDetector {
    config: DriftConfig,
    blocks: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl DriftDetector {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            config,
            blocks: Mutex::new(HashMap::new()),
        }
    }

    /// Target rule: broken once consecutive failures reach the
    /// configured threshold.
    pub fn should_mark_broken(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.config.broken_after_failures
    }

    /// Records one block-class failure for `source_id` at `at` and
    /// reports whether the source crossed the disable threshold.
    pub fn record_block(&self, source_id: &str, at: DateTime<Utc>) -> BlockDecision {
        let window = Duration::seconds(self.config.block_window_secs as i64);
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        let entries = blocks.entry(source_id.to_string()).or_default();

        entries.push_back(at);
        while let Some(front) = entries.front() {
            if at - *front > window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() as u32 >= self.config.block_threshold {
            BlockDecision::DisableSource
        } else {
            BlockDecision::WithinTolerance
        }
    }

    /// Clears a source's window, e.g. after a successful unblocked
    /// fetch.
    pub fn record_unblocked(&self, source_id: &str) {
        let mut blocks = self.blocks.lock().unwrap_or_else(|e| e.into_inner());
        blocks.remove(source_id);
    }
}
