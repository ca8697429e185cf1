//! Development worker runner.
//!
//! Boots the full pipeline against the in-memory store, seeds it from
//! a JSON file, drains the job queue with a worker pool, and prints the
//! finalized run summary as JSON. Useful for exercising the pipeline
//! end to end without the production store or queue transport.
//!
//! Usage: scrape_worker <seed.json> [--config <path.toml>]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ammo_ingest::adapters::registry::AdapterRegistry;
use ammo_ingest::domain::{
    JobQueue, JobTrigger, ResolverQueue, RunStatus, ScrapeJob, ScrapeRun, ScrapeSource,
    ScrapeStore, ScrapeTarget,
};
use ammo_ingest::fetch::{FetchPolicy, FetchPolicyConfig};
use ammo_ingest::infrastructure::http_client::{HttpClient, HttpClientConfig};
use ammo_ingest::infrastructure::memory_store::{
    MemoryJobQueue, MemoryResolverQueue, MemoryStore,
};
use ammo_ingest::infrastructure::{config::AppConfig, logging};
use ammo_ingest::pipeline::drift::{DriftConfig, DriftDetector};
use ammo_ingest::pipeline::{OfferWriter, RunDedupStore, ScrapeWorker, WorkerPool};

/// Seed job as written in the file; the run id is stamped at startup.
#[derive(Debug, Deserialize)]
struct SeedJob {
    target_id: String,
    url: String,
    source_id: String,
    retailer_id: String,
    adapter_id: String,
    #[serde(default = "default_trigger")]
    trigger: JobTrigger,
}

fn default_trigger() -> JobTrigger {
    JobTrigger::Manual
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    sources: Vec<ScrapeSource>,
    targets: Vec<ScrapeTarget>,
    jobs: Vec<SeedJob>,
}

struct CliArgs {
    seed_path: PathBuf,
    config_path: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs> {
    let mut seed_path = None;
    let mut config_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .context("--config requires a path argument")?;
                config_path = Some(PathBuf::from(value));
            }
            other if seed_path.is_none() => seed_path = Some(PathBuf::from(other)),
            other => bail!("unexpected argument '{other}'"),
        }
    }
    Ok(CliArgs {
        seed_path: seed_path.context("usage: scrape_worker <seed.json> [--config <path.toml>]")?,
        config_path,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let config = AppConfig::load(args.config_path.as_deref())?;
    logging::init_logging(&config.logging)?;

    let seed_raw = tokio::fs::read_to_string(&args.seed_path)
        .await
        .with_context(|| format!("Failed to read seed file {}", args.seed_path.display()))?;
    let seed: SeedFile =
        serde_json::from_str(&seed_raw).context("Seed file did not parse as JSON")?;
    info!(
        sources = seed.sources.len(),
        targets = seed.targets.len(),
        jobs = seed.jobs.len(),
        "seed loaded"
    );

    let store = Arc::new(MemoryStore::new());
    for source in seed.sources {
        store.insert_source(source).await;
    }
    for target in seed.targets {
        store.insert_target(target).await;
    }

    let registry = Arc::new(AdapterRegistry::with_builtin_sites()?);
    info!(adapters = ?registry.ids(), "adapter registry built");

    let http = HttpClient::new(HttpClientConfig {
        user_agent: config.fetch.user_agent.clone(),
        timeout_seconds: config.fetch.request_timeout_seconds,
        ..Default::default()
    })?;
    let fetch = Arc::new(FetchPolicy::new(
        http,
        FetchPolicyConfig {
            robots_success_ttl: std::time::Duration::from_secs(
                config.fetch.robots_success_ttl_seconds,
            ),
            robots_failure_ttl: std::time::Duration::from_secs(
                config.fetch.robots_failure_ttl_seconds,
            ),
        },
    ));

    let drift = Arc::new(DriftDetector::new(DriftConfig {
        broken_after_failures: config.drift.broken_after_failures,
        block_threshold: config.drift.block_threshold,
        block_window_secs: config.drift.block_window_seconds as u64,
    }));
    let writer = Arc::new(OfferWriter::new(
        store.clone() as Arc<dyn ScrapeStore>,
        drift,
    ));
    let resolver = Arc::new(MemoryResolverQueue::new());

    let mut run = ScrapeRun::start();
    info!(run_id = %run.id, "scrape run started");

    let queue = Arc::new(MemoryJobQueue::new());
    for job in seed.jobs {
        queue
            .push(ScrapeJob {
                target_id: job.target_id,
                url: job.url,
                source_id: job.source_id,
                retailer_id: job.retailer_id,
                adapter_id: job.adapter_id,
                run_id: run.id.clone(),
                trigger: job.trigger,
            })
            .await;
    }

    let worker = Arc::new(ScrapeWorker::new(
        store.clone() as Arc<dyn ScrapeStore>,
        registry,
        fetch,
        writer,
        Arc::new(RunDedupStore::new()),
        resolver.clone() as Arc<dyn ResolverQueue>,
        run.metrics.clone(),
    ));
    let pool = WorkerPool::new(
        worker,
        queue as Arc<dyn JobQueue>,
        config.worker.concurrency,
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, draining in-flight jobs");
            signal_token.cancel();
        }
    });

    let processed = pool.run(shutdown.clone()).await;
    let status = if shutdown.is_cancelled() {
        RunStatus::Aborted
    } else {
        RunStatus::Completed
    };
    let summary = run.finalize(status, Utc::now());
    info!(
        run_id = %summary.run_id,
        processed,
        resolver_jobs = resolver.len().await,
        "run finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
