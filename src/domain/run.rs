//! Scrape runs and their shared, concurrently-updated metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

/// Counters incremented by every worker of a run. Plain atomics: no
/// coordination beyond the shared store is required or wanted.
#[derive(Debug, Default)]
pub struct RunMetrics {
    pub urls_attempted: AtomicU64,
    pub urls_succeeded: AtomicU64,
    pub urls_failed: AtomicU64,
    pub offers_extracted: AtomicU64,
    pub offers_valid: AtomicU64,
    pub offers_dropped: AtomicU64,
    pub offers_quarantined: AtomicU64,
    pub oos_without_price: AtomicU64,
}

impl RunMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            urls_attempted: self.urls_attempted.load(Ordering::Relaxed),
            urls_succeeded: self.urls_succeeded.load(Ordering::Relaxed),
            urls_failed: self.urls_failed.load(Ordering::Relaxed),
            offers_extracted: self.offers_extracted.load(Ordering::Relaxed),
            offers_valid: self.offers_valid.load(Ordering::Relaxed),
            offers_dropped: self.offers_dropped.load(Ordering::Relaxed),
            offers_quarantined: self.offers_quarantined.load(Ordering::Relaxed),
            oos_without_price: self.oos_without_price.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters, used for finalization and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub urls_attempted: u64,
    pub urls_succeeded: u64,
    pub urls_failed: u64,
    pub offers_extracted: u64,
    pub offers_valid: u64,
    pub offers_dropped: u64,
    pub offers_quarantined: u64,
    pub oos_without_price: u64,
}

/// One execution batch of scrape jobs.
#[derive(Debug, Clone)]
pub struct ScrapeRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
    pub metrics: Arc<RunMetrics>,
}

/// Finalized run record with rates derived strictly from the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub counters: MetricsSnapshot,
    pub failure_rate: f64,
    pub yield_rate: f64,
}

impl ScrapeRun {
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            status: RunStatus::Running,
            metrics: Arc::new(RunMetrics::default()),
        }
    }

    /// Finalizes the run exactly once. Rates are computed from the
    /// counter snapshot alone, never from any other derived state.
    pub fn finalize(&mut self, status: RunStatus, finished_at: DateTime<Utc>) -> RunSummary {
        self.status = status;
        let counters = self.metrics.snapshot();
        RunSummary {
            run_id: self.id.clone(),
            started_at: self.started_at,
            finished_at,
            status,
            counters,
            failure_rate: rate(counters.urls_failed, counters.urls_attempted),
            yield_rate: rate(counters.offers_valid, counters.offers_extracted),
        }
    }
}

fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
