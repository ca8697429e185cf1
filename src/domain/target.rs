//! Scrape targets and sources under health management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a tracked retailer product URL. Targets are never
/// deleted; a persistently failing target transitions to `Broken` and
/// stays there until an operator resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetStatus {
    Active,
    Broken,
}

/// Outcome of the most recent attempt against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Success,
    Failure,
}

/// One retailer product URL under management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub id: String,
    pub source_id: String,
    /// Authoritative link once set; the writer skips its upsert search
    /// when this is present.
    pub source_product_id: Option<String>,
    pub url: String,
    pub last_status: Option<AttemptStatus>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Admin override: true short-circuits the job as a tracked failure
    /// without attempting a fetch.
    pub robots_path_blocked: bool,
    pub status: TargetStatus,
}

impl ScrapeTarget {
    pub fn is_active(&self) -> bool {
        self.status == TargetStatus::Active
    }
}

/// A retailer source with its admin compliance switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSource {
    pub id: String,
    pub name: String,
    pub domain: String,
    /// Admin switch; false means no fetches for this source at all.
    pub scrape_enabled: bool,
    /// Flipped to false by the drift detector after persistent blocking.
    pub robots_compliant: bool,
}

impl ScrapeSource {
    /// Both switches must be on before any network call for this source.
    pub fn may_fetch(&self) -> bool {
        self.scrape_enabled && self.robots_compliant
    }
}
