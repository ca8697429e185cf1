//! The per-job worker state machine and the worker pool.
//!
//! Each job walks fetch → extract → normalize/validate → dedupe-check
//! → write → enqueue-downstream. Every transition updates run metrics
//! and target health exactly once, then terminates the job. Workers
//! are stateless; all shared state lives in the store, the run-scoped
//! dedup set, and the run counters.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use url::Url;

use crate::adapters::registry::AdapterRegistry;
use crate::adapters::{ExtractError, RawDocument, SiteAdapter};
use crate::domain::{
    AttemptStatus, JobQueue, QuarantinedRecord, ResolverContext, ResolverJob, ResolverQueue,
    ResolverTrigger, RunMetrics, ScrapeJob, ScrapeStore, ScrapeTarget,
};
use crate::fetch::{FetchFailure, FetchPolicy};
use crate::pipeline::dedup::RunDedupStore;
use crate::pipeline::validate::{
    self, DropReason, QuarantineReason, Verdict,
};
use crate::pipeline::writer::{OfferWriter, WriteSuccess};

/// Version tag carried on every resolver enqueue.
pub const RESOLVER_VERSION: &str = "1";

/// Terminal outcome of one job, for logs and tests. Job-level errors
/// (unknown adapter, unknown target) are `Err` from `process_job`
/// instead; those fail the job rather than classify it.
#[derive(Debug)]
pub enum JobOutcome {
    /// Price written and resolver job enqueued.
    Written(WriteSuccess),
    /// The page conveyed "out of stock, no price", which is a success.
    OosNoPrice,
    /// Another worker already wrote this identity key in this run.
    Duplicate,
    Dropped(DropReason),
    Quarantined(Vec<QuarantineReason>),
    /// Admin robots-path override; tracked failure, no fetch attempted.
    PathBlocked,
    /// Source switched off (admin or auto-disable); nothing attempted.
    SourceDisabled,
    /// Target already Broken when the job arrived.
    TargetBroken,
    FetchFailed(FetchFailure),
    ExtractFailed(ExtractError),
    WriteFailed(String),
}

/// One stateless job processor. Clone-free: share via `Arc`.
pub struct ScrapeWorker {
    store: Arc<dyn ScrapeStore>,
    registry: Arc<AdapterRegistry>,
    fetch: Arc<FetchPolicy>,
    writer: Arc<OfferWriter>,
    dedup: Arc<RunDedupStore>,
    resolver: Arc<dyn ResolverQueue>,
    metrics: Arc<RunMetrics>,
}

impl ScrapeWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ScrapeStore>,
        registry: Arc<AdapterRegistry>,
        fetch: Arc<FetchPolicy>,
        writer: Arc<OfferWriter>,
        dedup: Arc<RunDedupStore>,
        resolver: Arc<dyn ResolverQueue>,
        metrics: Arc<RunMetrics>,
    ) -> Self {
        Self {
            store,
            registry,
            fetch,
            writer,
            dedup,
            resolver,
            metrics,
        }
    }

    /// Runs one job through the full state machine.
    pub async fn process_job(&self, job: &ScrapeJob) -> Result<JobOutcome> {
        self.metrics.urls_attempted.fetch_add(1, Ordering::Relaxed);

        let Some(adapter) = self.registry.get(&job.adapter_id) else {
            self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
            return Err(anyhow!(
                "no adapter registered for id '{}'",
                job.adapter_id
            ));
        };
        let target = match self.store.get_target(&job.target_id).await? {
            Some(target) => target,
            None => {
                self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
                return Err(anyhow!("unknown target '{}'", job.target_id));
            }
        };
        let source = match self.store.get_source(&job.source_id).await? {
            Some(source) => source,
            None => {
                self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
                return Err(anyhow!("unknown source '{}'", job.source_id));
            }
        };

        if !target.is_active() {
            self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
            debug!(target_id = %target.id, "job for broken target skipped");
            return Ok(JobOutcome::TargetBroken);
        }
        if !source.may_fetch() {
            self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
            debug!(source_id = %source.id, "job for disabled source skipped");
            return Ok(JobOutcome::SourceDisabled);
        }
        if target.robots_path_blocked {
            // Admin override: tracked failure, never a source block.
            self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
            self.writer
                .track_attempt(&target.id, AttemptStatus::Failure, Utc::now())
                .await;
            return Ok(JobOutcome::PathBlocked);
        }

        let (url, document) = match self.fetch.fetch(&job.url, &adapter.manifest().rate_limit).await
        {
            Ok(fetched) => {
                self.writer.track_unblocked(&job.source_id);
                fetched
            }
            Err(failure) => {
                self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
                self.writer
                    .track_attempt(&target.id, AttemptStatus::Failure, Utc::now())
                    .await;
                if failure.is_block() {
                    self.writer.track_block(&job.source_id, Utc::now()).await;
                }
                debug!(url = %job.url, %failure, "fetch failed");
                return Ok(JobOutcome::FetchFailed(failure));
            }
        };

        Ok(self
            .ingest(job, &target, adapter.as_ref(), &url, &document)
            .await)
    }

    /// The post-fetch half of the state machine: extract, validate,
    /// dedupe, write, enqueue. Split from `process_job` so tests can
    /// run a captured document through it without a live fetch.
    async fn ingest(
        &self,
        job: &ScrapeJob,
        target: &ScrapeTarget,
        adapter: &dyn SiteAdapter,
        url: &Url,
        document: &RawDocument,
    ) -> JobOutcome {
        let raw = match adapter.extract(document, url) {
            Ok(mut raw) => {
                raw.source_id = job.source_id.clone();
                self.metrics.offers_extracted.fetch_add(1, Ordering::Relaxed);
                raw
            }
            Err(ExtractError::OosNoPrice) => {
                // The page successfully conveyed its state.
                self.metrics.urls_succeeded.fetch_add(1, Ordering::Relaxed);
                self.metrics.oos_without_price.fetch_add(1, Ordering::Relaxed);
                self.writer
                    .track_attempt(&target.id, AttemptStatus::Success, Utc::now())
                    .await;
                return JobOutcome::OosNoPrice;
            }
            Err(error) => {
                self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
                self.writer
                    .track_attempt(&target.id, AttemptStatus::Failure, Utc::now())
                    .await;
                debug!(url = %job.url, %error, "extraction failed");
                return JobOutcome::ExtractFailed(error);
            }
        };

        let outcome = adapter.normalize(raw);
        match outcome.verdict {
            Verdict::Drop(reason) => {
                self.metrics.offers_dropped.fetch_add(1, Ordering::Relaxed);
                let status = if validate::drop_counts_toward_drift(reason) {
                    AttemptStatus::Failure
                } else {
                    AttemptStatus::Success
                };
                self.writer
                    .track_attempt(&target.id, status, Utc::now())
                    .await;
                JobOutcome::Dropped(reason)
            }
            Verdict::Quarantine(reasons) => {
                self.metrics
                    .offers_quarantined
                    .fetch_add(1, Ordering::Relaxed);
                let status = if validate::quarantine_reasons_count_toward_drift(&reasons) {
                    AttemptStatus::Failure
                } else {
                    AttemptStatus::Success
                };
                self.writer
                    .track_attempt(&target.id, status, Utc::now())
                    .await;
                let record = quarantine_record(&outcome.offer, &reasons, job);
                if let Err(e) = self.writer.quarantine(&record).await {
                    warn!(identity_key = %record.identity_key, error = %e,
                        "failed to persist quarantine record");
                }
                JobOutcome::Quarantined(reasons)
            }
            Verdict::Accept => {
                let offer = outcome.offer;
                if self.dedup.check_and_add(&job.run_id, &offer.identity_key) {
                    // Duplicate within the run: succeeded, not written.
                    self.metrics.offers_dropped.fetch_add(1, Ordering::Relaxed);
                    self.writer
                        .track_attempt(&target.id, AttemptStatus::Success, Utc::now())
                        .await;
                    return JobOutcome::Duplicate;
                }
                match self.writer.write(&offer, target, &job.run_id).await {
                    Ok(success) => {
                        self.metrics.urls_succeeded.fetch_add(1, Ordering::Relaxed);
                        self.metrics.offers_valid.fetch_add(1, Ordering::Relaxed);
                        self.writer
                            .track_attempt(&target.id, AttemptStatus::Success, Utc::now())
                            .await;
                        self.enqueue_resolution(&success, &offer.identity_key, job)
                            .await;
                        JobOutcome::Written(success)
                    }
                    Err(error) => {
                        self.metrics.urls_failed.fetch_add(1, Ordering::Relaxed);
                        self.writer
                            .track_attempt(&target.id, AttemptStatus::Failure, Utc::now())
                            .await;
                        warn!(target_id = %target.id, %error, "write failed");
                        JobOutcome::WriteFailed(error.to_string())
                    }
                }
            }
        }
    }

    /// Enqueues the downstream resolver job, once per successful write.
    /// The written price stands even if the enqueue fails.
    async fn enqueue_resolution(&self, success: &WriteSuccess, identity_key: &str, job: &ScrapeJob) {
        let resolver_job = ResolverJob {
            source_product_id: success.source_product_id.clone(),
            trigger: ResolverTrigger::Ingest,
            resolver_version: RESOLVER_VERSION.to_string(),
            context: ResolverContext {
                source_id: job.source_id.clone(),
                identity_key: identity_key.to_string(),
            },
        };
        if let Err(e) = self.resolver.enqueue(resolver_job).await {
            warn!(
                source_product_id = %success.source_product_id,
                error = %e,
                "failed to enqueue resolver job"
            );
        }
    }
}

fn quarantine_record(
    offer: &crate::domain::NormalizedScrapeOffer,
    reasons: &[QuarantineReason],
    job: &ScrapeJob,
) -> QuarantinedRecord {
    let now = Utc::now();
    QuarantinedRecord {
        source_id: offer.offer.source_id.clone(),
        identity_key: offer.identity_key.clone(),
        offer: offer.clone(),
        reasons: reasons.iter().map(|r| r.code().to_string()).collect(),
        run_id: job.run_id.clone(),
        first_seen_at: now,
        last_seen_at: now,
    }
}

/// Pool of concurrent workers draining one job queue until it is empty
/// or the cancellation token fires.
pub struct WorkerPool {
    worker: Arc<ScrapeWorker>,
    queue: Arc<dyn JobQueue>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(worker: Arc<ScrapeWorker>, queue: Arc<dyn JobQueue>, concurrency: usize) -> Self {
        Self {
            worker,
            queue,
            concurrency: concurrency.max(1),
        }
    }

    /// Drains the queue with `concurrency` independent workers. Returns
    /// the number of jobs processed. A cancelled token stops pulls; jobs
    /// already in flight run to completion.
    pub async fn run(&self, shutdown: CancellationToken) -> usize {
        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_index in 0..self.concurrency {
            let worker = Arc::clone(&self.worker);
            let queue = Arc::clone(&self.queue);
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut processed = 0usize;
                loop {
                    if shutdown.is_cancelled() {
                        break;
                    }
                    let job = match queue.pull().await {
                        Ok(Some(job)) => job,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(worker_index, error = %e, "queue pull failed");
                            break;
                        }
                    };
                    match worker.process_job(&job).await {
                        Ok(outcome) => {
                            debug!(worker_index, target_id = %job.target_id, ?outcome, "job done")
                        }
                        Err(e) => warn!(worker_index, target_id = %job.target_id, error = %e, "job failed"),
                    }
                    processed += 1;
                }
                processed
            }));
        }

        let mut total = 0;
        for handle in handles {
            match handle.await {
                Ok(processed) => total += processed,
                Err(e) => warn!(error = %e, "worker task panicked"),
            }
        }
        info!(jobs = total, "worker pool drained");
        total
    }
}
