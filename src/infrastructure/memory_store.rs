//! In-memory store and queue implementations.
//!
//! Back the pipeline in tests and in the dev binary, where the real
//! relational store and queue transport are not wired up. Semantics
//! mirror what the production collaborators guarantee: upserts are
//! idempotent, price inserts append, and attempt recording returns the
//! updated consecutive-failure count.

use std::collections::{HashMap, VecDeque};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    AttemptStatus, JobQueue, PriceObservation, QuarantinedRecord, ResolverJob, ResolverQueue,
    ScrapeJob, ScrapeSource, ScrapeStore, ScrapeTarget, TargetStatus,
};

#[derive(Debug, Clone)]
struct SourceProductRow {
    id: String,
    title: String,
    url: String,
}

/// In-memory [`ScrapeStore`].
#[derive(Default)]
pub struct MemoryStore {
    targets: Mutex<HashMap<String, ScrapeTarget>>,
    sources: Mutex<HashMap<String, ScrapeSource>>,
    source_products: Mutex<HashMap<(String, String), SourceProductRow>>,
    prices: Mutex<Vec<(String, PriceObservation)>>,
    quarantine: Mutex<HashMap<(String, String), QuarantinedRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_target(&self, target: ScrapeTarget) {
        self.targets.lock().await.insert(target.id.clone(), target);
    }

    pub async fn insert_source(&self, source: ScrapeSource) {
        self.sources.lock().await.insert(source.id.clone(), source);
    }

    pub async fn price_count(&self) -> usize {
        self.prices.lock().await.len()
    }

    pub async fn prices(&self) -> Vec<PriceObservation> {
        self.prices
            .lock()
            .await
            .iter()
            .map(|(_, obs)| obs.clone())
            .collect()
    }

    pub async fn quarantine_record(
        &self,
        source_id: &str,
        identity_key: &str,
    ) -> Option<QuarantinedRecord> {
        self.quarantine
            .lock()
            .await
            .get(&(source_id.to_string(), identity_key.to_string()))
            .cloned()
    }

    pub async fn quarantine_count(&self) -> usize {
        self.quarantine.lock().await.len()
    }
}

#[async_trait]
impl ScrapeStore for MemoryStore {
    async fn get_target(&self, target_id: &str) -> Result<Option<ScrapeTarget>> {
        Ok(self.targets.lock().await.get(target_id).cloned())
    }

    async fn get_source(&self, source_id: &str) -> Result<Option<ScrapeSource>> {
        Ok(self.sources.lock().await.get(source_id).cloned())
    }

    async fn record_attempt(
        &self,
        target_id: &str,
        status: AttemptStatus,
        at: DateTime<Utc>,
    ) -> Result<u32> {
        let mut targets = self.targets.lock().await;
        let Some(target) = targets.get_mut(target_id) else {
            bail!("unknown target '{target_id}'");
        };
        target.last_status = Some(status);
        target.last_attempt_at = Some(at);
        target.consecutive_failures = match status {
            AttemptStatus::Success => 0,
            AttemptStatus::Failure => target.consecutive_failures + 1,
        };
        Ok(target.consecutive_failures)
    }

    async fn mark_target_broken(&self, target_id: &str) -> Result<()> {
        let mut targets = self.targets.lock().await;
        let Some(target) = targets.get_mut(target_id) else {
            bail!("unknown target '{target_id}'");
        };
        target.status = TargetStatus::Broken;
        Ok(())
    }

    async fn set_source_noncompliant(&self, source_id: &str) -> Result<bool> {
        let mut sources = self.sources.lock().await;
        let Some(source) = sources.get_mut(source_id) else {
            bail!("unknown source '{source_id}'");
        };
        let changed = source.robots_compliant;
        source.robots_compliant = false;
        Ok(changed)
    }

    async fn upsert_source_product(
        &self,
        source_id: &str,
        identity_key: &str,
        title: &str,
        url: &str,
    ) -> Result<String> {
        let key = (source_id.to_string(), identity_key.to_string());
        let mut products = self.source_products.lock().await;
        if let Some(row) = products.get_mut(&key) {
            row.title = title.to_string();
            row.url = url.to_string();
            return Ok(row.id.clone());
        }
        let id = format!("sp-{}", Uuid::new_v4());
        products.insert(
            key,
            SourceProductRow {
                id: id.clone(),
                title: title.to_string(),
                url: url.to_string(),
            },
        );
        Ok(id)
    }

    async fn link_target(&self, target_id: &str, source_product_id: &str) -> Result<()> {
        let mut targets = self.targets.lock().await;
        let Some(target) = targets.get_mut(target_id) else {
            bail!("unknown target '{target_id}'");
        };
        target.source_product_id = Some(source_product_id.to_string());
        Ok(())
    }

    async fn insert_price(&self, observation: &PriceObservation) -> Result<String> {
        let id = format!("pr-{}", Uuid::new_v4());
        self.prices
            .lock()
            .await
            .push((id.clone(), observation.clone()));
        Ok(id)
    }

    async fn upsert_quarantine(&self, record: &QuarantinedRecord) -> Result<()> {
        let key = (record.source_id.clone(), record.identity_key.clone());
        let mut quarantine = self.quarantine.lock().await;
        match quarantine.get_mut(&key) {
            Some(existing) => {
                // The first sighting timestamp survives re-quarantine.
                let first_seen_at = existing.first_seen_at;
                *existing = record.clone();
                existing.first_seen_at = first_seen_at;
            }
            None => {
                quarantine.insert(key, record.clone());
            }
        }
        Ok(())
    }
}

/// In-memory [`ResolverQueue`] that records what was enqueued.
#[derive(Default)]
pub struct MemoryResolverQueue {
    jobs: Mutex<Vec<ResolverJob>>,
}

impl MemoryResolverQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn drained(&self) -> Vec<ResolverJob> {
        self.jobs.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl ResolverQueue for MemoryResolverQueue {
    async fn enqueue(&self, job: ResolverJob) -> Result<()> {
        self.jobs.lock().await.push(job);
        Ok(())
    }
}

/// In-memory FIFO [`JobQueue`].
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<VecDeque<ScrapeJob>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, job: ScrapeJob) {
        self.jobs.lock().await.push_back(job);
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn pull(&self) -> Result<Option<ScrapeJob>> {
        Ok(self.jobs.lock().await.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Availability, BallisticFields, NormalizedScrapeOffer, PriceCents, RawScrapeOffer,
    };

    fn target(id: &str) -> ScrapeTarget {
        ScrapeTarget {
            id: id.into(),
            source_id: "src-1".into(),
            source_product_id: None,
            url: "https://shop.test/p/1".into(),
            last_status: None,
            last_attempt_at: None,
            consecutive_failures: 0,
            robots_path_blocked: false,
            status: TargetStatus::Active,
        }
    }

    fn source(id: &str) -> ScrapeSource {
        ScrapeSource {
            id: id.into(),
            name: "Test Source".into(),
            domain: "shop.test".into(),
            scrape_enabled: true,
            robots_compliant: true,
        }
    }

    fn quarantined(run_id: &str) -> QuarantinedRecord {
        let raw = RawScrapeOffer {
            source_id: "src-1".into(),
            retailer_id: "ret-1".into(),
            url: "https://shop.test/p/1".into(),
            title: "9mm Luger 115gr 50 rounds".into(),
            price: Some(PriceCents::Unparsable),
            availability: Availability::InStock,
            observed_at: Utc::now(),
            retailer_product_id: Some("P-1".into()),
            retailer_sku: None,
            upc: None,
            ballistics: BallisticFields::default(),
            adapter_version: "1.0.0".into(),
            extraction_notes: Vec::new(),
        };
        QuarantinedRecord {
            source_id: "src-1".into(),
            identity_key: "PID:P-1".into(),
            offer: NormalizedScrapeOffer {
                offer: raw,
                identity_key: "PID:P-1".into(),
                cost_per_round_cents: None,
            },
            reasons: vec!["PRICE_PARSE_FAILED".into()],
            run_id: run_id.into(),
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn attempt_recording_tracks_consecutive_failures() {
        let store = MemoryStore::new();
        store.insert_target(target("t-1")).await;

        let now = Utc::now();
        assert_eq!(
            store
                .record_attempt("t-1", AttemptStatus::Failure, now)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .record_attempt("t-1", AttemptStatus::Failure, now)
                .await
                .unwrap(),
            2
        );
        // A success resets the streak.
        assert_eq!(
            store
                .record_attempt("t-1", AttemptStatus::Success, now)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn noncompliance_flip_reports_change_exactly_once() {
        let store = MemoryStore::new();
        store.insert_source(source("src-1")).await;

        assert!(store.set_source_noncompliant("src-1").await.unwrap());
        assert!(!store.set_source_noncompliant("src-1").await.unwrap());
        let source = store.get_source("src-1").await.unwrap().unwrap();
        assert!(!source.may_fetch());
    }

    #[tokio::test]
    async fn source_product_upsert_is_stable_by_identity_key() {
        let store = MemoryStore::new();
        let first = store
            .upsert_source_product("src-1", "PID:P-1", "Title A", "https://shop.test/a")
            .await
            .unwrap();
        let second = store
            .upsert_source_product("src-1", "PID:P-1", "Title B", "https://shop.test/a")
            .await
            .unwrap();
        assert_eq!(first, second);

        let other = store
            .upsert_source_product("src-2", "PID:P-1", "Title A", "https://shop.test/a")
            .await
            .unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn quarantine_upsert_preserves_first_seen() {
        let store = MemoryStore::new();
        let first = quarantined("run-1");
        let first_seen = first.first_seen_at;
        store.upsert_quarantine(&first).await.unwrap();

        let mut second = quarantined("run-2");
        second.first_seen_at = Utc::now();
        store.upsert_quarantine(&second).await.unwrap();

        assert_eq!(store.quarantine_count().await, 1);
        let kept = store.quarantine_record("src-1", "PID:P-1").await.unwrap();
        assert_eq!(kept.run_id, "run-2");
        assert_eq!(kept.first_seen_at, first_seen);
    }

    #[tokio::test]
    async fn job_queue_is_fifo_and_drains_to_none() {
        let queue = MemoryJobQueue::new();
        for i in 0..2 {
            queue
                .push(ScrapeJob {
                    target_id: format!("t-{i}"),
                    url: "https://shop.test/p/1".into(),
                    source_id: "src-1".into(),
                    retailer_id: "ret-1".into(),
                    adapter_id: "brass-house".into(),
                    run_id: "run-1".into(),
                    trigger: crate::domain::JobTrigger::Scheduled,
                })
                .await;
        }
        assert_eq!(queue.pull().await.unwrap().unwrap().target_id, "t-0");
        assert_eq!(queue.pull().await.unwrap().unwrap().target_id, "t-1");
        assert!(queue.pull().await.unwrap().is_none());
    }
}
