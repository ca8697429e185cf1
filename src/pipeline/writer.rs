//! The writer: sole owner of persistent-state transitions.
//!
//! Appends price observations, upserts source-product rows, persists
//! quarantine records, and applies the drift detector's decisions to
//! target and source health. Persistence errors are returned as typed
//! values; nothing here panics across the worker boundary.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{
    AttemptStatus, NormalizedScrapeOffer, PriceObservation, QuarantinedRecord, RunType,
    ScrapeStore, ScrapeTarget,
};

use super::drift::{BlockDecision, DriftDetector};

#[derive(Debug, Error)]
pub enum WriteError {
    /// Accepted offers always carry a concrete price; reaching the
    /// writer without one means a gate bypass upstream.
    #[error("offer has no concrete price")]
    NoConcretePrice,
    #[error("persistence failed: {0}")]
    Store(String),
}

/// Successful write: ids for provenance and downstream resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSuccess {
    pub source_product_id: String,
    pub price_id: String,
}

pub struct OfferWriter {
    store: Arc<dyn ScrapeStore>,
    drift: Arc<DriftDetector>,
}

impl OfferWriter {
    pub fn new(store: Arc<dyn ScrapeStore>, drift: Arc<DriftDetector>) -> Self {
        Self { store, drift }
    }

    /// Upserts the source-product, appends exactly one price row tagged
    /// with run provenance, and links the target when it was unlinked.
    ///
    /// If the target already links a source-product that link is
    /// authoritative and no upsert search is performed.
    pub async fn write(
        &self,
        offer: &NormalizedScrapeOffer,
        target: &ScrapeTarget,
        run_id: &str,
    ) -> Result<WriteSuccess, WriteError> {
        let price_cents = offer
            .offer
            .price
            .as_ref()
            .and_then(|p| p.cents())
            .ok_or(WriteError::NoConcretePrice)?;

        let source_product_id = match &target.source_product_id {
            Some(linked) => linked.clone(),
            None => {
                let id = self
                    .store
                    .upsert_source_product(
                        &offer.offer.source_id,
                        &offer.identity_key,
                        &offer.offer.title,
                        &offer.offer.url,
                    )
                    .await
                    .map_err(|e| WriteError::Store(e.to_string()))?;
                self.store
                    .link_target(&target.id, &id)
                    .await
                    .map_err(|e| WriteError::Store(e.to_string()))?;
                id
            }
        };

        let observation = PriceObservation {
            source_product_id: source_product_id.clone(),
            price_cents,
            availability: offer.offer.availability,
            cost_per_round_cents: offer.cost_per_round_cents,
            observed_at: offer.offer.observed_at,
            run_id: run_id.to_string(),
            run_type: RunType::Scrape,
        };
        let price_id = self
            .store
            .insert_price(&observation)
            .await
            .map_err(|e| WriteError::Store(e.to_string()))?;

        Ok(WriteSuccess {
            source_product_id,
            price_id,
        })
    }

    /// Persists a quarantine record (upsert by source + identity key).
    pub async fn quarantine(&self, record: &QuarantinedRecord) -> Result<(), WriteError> {
        self.store
            .upsert_quarantine(record)
            .await
            .map_err(|e| WriteError::Store(e.to_string()))
    }

    /// Records one attempt outcome against the target and applies the
    /// drift detector's broken-threshold rule. Health tracking failures
    /// are logged, not propagated: the job outcome stands either way.
    pub async fn track_attempt(&self, target_id: &str, status: AttemptStatus, at: DateTime<Utc>) {
        match self.store.record_attempt(target_id, status, at).await {
            Ok(consecutive_failures) => {
                if status == AttemptStatus::Failure && self.drift.should_mark_broken(consecutive_failures) {
                    if let Err(e) = self.store.mark_target_broken(target_id).await {
                        warn!(target_id, error = %e, "failed to mark target broken");
                    } else {
                        info!(target_id, consecutive_failures, "target marked broken");
                    }
                }
            }
            Err(e) => warn!(target_id, error = %e, "failed to record attempt"),
        }
    }

    /// Records a block-class failure for the source and disables it
    /// when the window threshold is crossed. The flag write is
    /// idempotent; only an actual flip is logged.
    pub async fn track_block(&self, source_id: &str, at: DateTime<Utc>) {
        if self.drift.record_block(source_id, at) == BlockDecision::DisableSource {
            match self.store.set_source_noncompliant(source_id).await {
                Ok(true) => {
                    warn!(source_id, "source auto-disabled after repeated blocks");
                }
                Ok(false) => {}
                Err(e) => warn!(source_id, error = %e, "failed to disable source"),
            }
        }
    }

    /// Clears the source's block window after an unblocked fetch.
    pub fn track_unblocked(&self, source_id: &str) {
        self.drift.record_unblocked(source_id);
    }
}
