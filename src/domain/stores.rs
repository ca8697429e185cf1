//! Store and queue traits at the pipeline's external seams.
//!
//! The relational storage layer, the job-queue transport, and the
//! product-identity resolver are external collaborators; the pipeline
//! sees them only through these traits. Tests and the dev binary use
//! the in-memory implementations in `infrastructure::memory_store`.

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::offer::Availability;
use super::quarantine::QuarantinedRecord;
use super::target::{AttemptStatus, ScrapeSource, ScrapeTarget};

/// Provenance tag on every written price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunType {
    Scrape,
}

/// An append-only price observation. Once written it is never mutated
/// or deleted by this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub source_product_id: String,
    pub price_cents: i64,
    pub availability: Availability,
    pub cost_per_round_cents: Option<i64>,
    pub observed_at: DateTime<Utc>,
    pub run_id: String,
    pub run_type: RunType,
}

/// What triggered a scrape job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobTrigger {
    Scheduled,
    Manual,
    Retry,
}

/// One queued unit of work: scrape a single target URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub target_id: String,
    pub url: String,
    pub source_id: String,
    pub retailer_id: String,
    pub adapter_id: String,
    pub run_id: String,
    pub trigger: JobTrigger,
}

/// Downstream resolver job, enqueued exactly once per successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverJob {
    pub source_product_id: String,
    pub trigger: ResolverTrigger,
    pub resolver_version: String,
    pub context: ResolverContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolverTrigger {
    Ingest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverContext {
    pub source_id: String,
    pub identity_key: String,
}

/// Persistence seam. Every method is an upsert or an append so that
/// queue redelivery after a worker crash can safely repeat it.
#[async_trait]
pub trait ScrapeStore: Send + Sync {
    async fn get_target(&self, target_id: &str) -> Result<Option<ScrapeTarget>>;
    async fn get_source(&self, source_id: &str) -> Result<Option<ScrapeSource>>;

    /// Records one attempt outcome and returns the updated
    /// consecutive-failure count.
    async fn record_attempt(
        &self,
        target_id: &str,
        status: AttemptStatus,
        at: DateTime<Utc>,
    ) -> Result<u32>;

    /// Active → Broken. Repeating the transition is a no-op.
    async fn mark_target_broken(&self, target_id: &str) -> Result<()>;

    /// Flips the source's compliance flag off. Returns true only when
    /// the flag actually changed, so callers can log the flip once.
    async fn set_source_noncompliant(&self, source_id: &str) -> Result<bool>;

    /// Upserts a source-product row by `(source_id, identity_key)` and
    /// returns its id.
    async fn upsert_source_product(
        &self,
        source_id: &str,
        identity_key: &str,
        title: &str,
        url: &str,
    ) -> Result<String>;

    async fn link_target(&self, target_id: &str, source_product_id: &str) -> Result<()>;

    /// Appends one price observation and returns its id.
    async fn insert_price(&self, observation: &PriceObservation) -> Result<String>;

    /// Upserts by `(source_id, identity_key)`; the latest payload wins.
    async fn upsert_quarantine(&self, record: &QuarantinedRecord) -> Result<()>;
}

/// Resolver enqueue seam.
#[async_trait]
pub trait ResolverQueue: Send + Sync {
    async fn enqueue(&self, job: ResolverJob) -> Result<()>;
}

/// Job-queue transport seam. A crashed worker leaves its job
/// unacknowledged for redelivery.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Pulls the next job, or `None` when the queue is drained.
    async fn pull(&self) -> Result<Option<ScrapeJob>>;
}
