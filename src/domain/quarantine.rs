//! Quarantined offers: persisted for human review, never consumer-visible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::offer::NormalizedScrapeOffer;

/// A persisted record of an offer that failed validation for a
/// recoverable reason. Upsert-keyed by `(source_id, identity_key)`;
/// repeated quarantines of the same key update the existing record.
/// Nothing in this pipeline ever promotes one to a visible price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantinedRecord {
    pub source_id: String,
    pub identity_key: String,
    pub offer: NormalizedScrapeOffer,
    /// Ordered blocking reasons, as emitted by the validation gate.
    pub reasons: Vec<String>,
    pub run_id: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}
