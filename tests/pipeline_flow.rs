//! End-to-end pipeline tests over the in-memory store: extraction
//! through write, run-scoped dedup under concurrency, quarantine
//! idempotence, and drift-driven auto-disable.

use std::sync::Arc;

use chrono::Utc;
use url::Url;

use ammo_ingest::adapters::registry::AdapterRegistry;
use ammo_ingest::adapters::{RawDocument, SiteAdapter};
use ammo_ingest::domain::{
    AttemptStatus, JobTrigger, ResolverQueue, RunMetrics, ScrapeJob, ScrapeSource, ScrapeStore,
    ScrapeTarget, TargetStatus,
};
use ammo_ingest::fetch::robots::RobotsRules;
use ammo_ingest::fetch::{FetchFailure, FetchPolicy, FetchPolicyConfig};
use ammo_ingest::infrastructure::http_client::HttpClient;
use ammo_ingest::infrastructure::memory_store::{MemoryResolverQueue, MemoryStore};
use ammo_ingest::pipeline::drift::{DriftConfig, DriftDetector};
use ammo_ingest::pipeline::{
    JobOutcome, OfferWriter, RunDedupStore, ScrapeWorker, Verdict,
};

const IN_STOCK_PAGE: &str = r#"
    <html><body><div class="product-detail">
      <h1 class="product-title">Federal 9mm Luger 115gr FMJ - 50 Rounds</h1>
      <span class="price">$14.99</span>
      <div class="stock-status">In Stock</div>
      <div class="product-meta"><span class="sku">ABC123</span></div>
    </div></body></html>"#;

fn target(id: &str, source_id: &str) -> ScrapeTarget {
    ScrapeTarget {
        id: id.into(),
        source_id: source_id.into(),
        source_product_id: None,
        url: "https://www.brasshousemunitions.com/p/9mm".into(),
        last_status: None,
        last_attempt_at: None,
        consecutive_failures: 0,
        robots_path_blocked: false,
        status: TargetStatus::Active,
    }
}

fn source(id: &str, domain: &str) -> ScrapeSource {
    ScrapeSource {
        id: id.into(),
        name: "Brass House Munitions".into(),
        domain: domain.into(),
        scrape_enabled: true,
        robots_compliant: true,
    }
}

fn writer_over(store: &Arc<MemoryStore>) -> Arc<OfferWriter> {
    let drift = Arc::new(DriftDetector::new(DriftConfig::default()));
    Arc::new(OfferWriter::new(
        store.clone() as Arc<dyn ScrapeStore>,
        drift,
    ))
}

fn extract_offer(source_id: &str) -> ammo_ingest::adapters::NormalizeOutcome {
    let registry = AdapterRegistry::with_builtin_sites().unwrap();
    let adapter = registry.get("brass-house").unwrap();
    let url = Url::parse("https://www.brasshousemunitions.com/p/9mm").unwrap();
    let mut raw = adapter
        .extract(&RawDocument::new(IN_STOCK_PAGE), &url)
        .unwrap();
    raw.source_id = source_id.to_string();
    adapter.normalize(raw)
}

#[tokio::test]
async fn extracted_offer_flows_to_one_price_row_with_link() {
    let store = Arc::new(MemoryStore::new());
    store.insert_target(target("t-1", "src-1")).await;
    store.insert_source(source("src-1", "www.brasshousemunitions.com")).await;
    let writer = writer_over(&store);

    let outcome = extract_offer("src-1");
    assert_eq!(outcome.verdict, Verdict::Accept);
    assert_eq!(outcome.offer.identity_key, "SKU:ABC123");
    // 1499 cents over 50 rounds.
    assert_eq!(outcome.offer.cost_per_round_cents, Some(29));

    let unlinked = store.get_target("t-1").await.unwrap().unwrap();
    let first = writer.write(&outcome.offer, &unlinked, "run-1").await.unwrap();
    assert_eq!(store.price_count().await, 1);

    // The write linked the target; a later write honors that link
    // without a second upsert search.
    let linked = store.get_target("t-1").await.unwrap().unwrap();
    assert_eq!(
        linked.source_product_id.as_deref(),
        Some(first.source_product_id.as_str())
    );
    let second = writer.write(&outcome.offer, &linked, "run-2").await.unwrap();
    assert_eq!(second.source_product_id, first.source_product_id);
    assert_eq!(store.price_count().await, 2);
}

#[tokio::test]
async fn concurrent_identity_collision_writes_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    store.insert_source(source("src-1", "www.brasshousemunitions.com")).await;
    for i in 0..2 {
        store.insert_target(target(&format!("t-{i}"), "src-1")).await;
    }
    let writer = writer_over(&store);
    let dedup = Arc::new(RunDedupStore::new());

    let mut handles = Vec::new();
    for i in 0..2 {
        let store = store.clone();
        let writer = writer.clone();
        let dedup = dedup.clone();
        handles.push(tokio::spawn(async move {
            let outcome = extract_offer("src-1");
            if dedup.check_and_add("run-1", &outcome.offer.identity_key) {
                // Duplicate: succeeded, not written.
                writer
                    .track_attempt(&format!("t-{i}"), AttemptStatus::Success, Utc::now())
                    .await;
                false
            } else {
                let t = store
                    .get_target(&format!("t-{i}"))
                    .await
                    .unwrap()
                    .unwrap();
                writer.write(&outcome.offer, &t, "run-1").await.unwrap();
                writer
                    .track_attempt(&format!("t-{i}"), AttemptStatus::Success, Utc::now())
                    .await;
                true
            }
        }));
    }
    let mut writes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            writes += 1;
        }
    }
    assert_eq!(writes, 1);
    assert_eq!(store.price_count().await, 1);
    // Both targets tracked as success.
    for i in 0..2 {
        let t = store.get_target(&format!("t-{i}")).await.unwrap().unwrap();
        assert_eq!(t.consecutive_failures, 0);
        assert_eq!(t.last_status, Some(AttemptStatus::Success));
    }
}

#[tokio::test]
async fn repeated_quarantine_upserts_one_record() {
    let store = Arc::new(MemoryStore::new());
    let writer = writer_over(&store);

    let registry = AdapterRegistry::with_builtin_sites().unwrap();
    let adapter = registry.get("ammo-lake").unwrap();
    let url = Url::parse("https://www.ammolake.com/api/products/9001").unwrap();
    let body = r#"{
        "product": {
            "id": "AL-9001",
            "name": "CCI 9mm Luger 115gr 50 rounds",
            "price": "13.99",
            "stock_status": "in_stock",
            "variants": [{"price": "13.99"}, {"price": "119.99"}]
        }
    }"#;
    let mut raw = adapter.extract(&RawDocument::new(body), &url).unwrap();
    raw.source_id = "src-1".to_string();
    let outcome = adapter.normalize(raw);
    let reasons = match &outcome.verdict {
        Verdict::Quarantine(reasons) => reasons.clone(),
        other => panic!("expected quarantine, got {other:?}"),
    };

    for run in ["run-1", "run-2"] {
        let now = Utc::now();
        let record = ammo_ingest::domain::QuarantinedRecord {
            source_id: "src-1".into(),
            identity_key: outcome.offer.identity_key.clone(),
            offer: outcome.offer.clone(),
            reasons: reasons.iter().map(|r| r.code().to_string()).collect(),
            run_id: run.into(),
            first_seen_at: now,
            last_seen_at: now,
        };
        writer.quarantine(&record).await.unwrap();
    }

    assert_eq!(store.quarantine_count().await, 1);
    let kept = store
        .quarantine_record("src-1", "PID:AL-9001")
        .await
        .unwrap();
    assert_eq!(kept.run_id, "run-2");
    assert_eq!(kept.reasons, vec!["AMBIGUOUS_PRICE".to_string()]);
    // Quarantined offers never become price rows.
    assert_eq!(store.price_count().await, 0);
}

#[tokio::test]
async fn persistent_failures_mark_target_broken_exactly_at_threshold() {
    let store = Arc::new(MemoryStore::new());
    store.insert_target(target("t-1", "src-1")).await;
    let writer = writer_over(&store);

    for i in 1..=5u32 {
        writer
            .track_attempt("t-1", AttemptStatus::Failure, Utc::now())
            .await;
        let t = store.get_target("t-1").await.unwrap().unwrap();
        assert_eq!(t.consecutive_failures, i);
        if i < 5 {
            assert_eq!(t.status, TargetStatus::Active);
        } else {
            assert_eq!(t.status, TargetStatus::Broken);
        }
    }
}

#[tokio::test]
async fn repeated_robots_blocks_auto_disable_the_source() {
    let store = Arc::new(MemoryStore::new());
    store.insert_source(source("src-1", "shop.test")).await;
    for i in 0..4 {
        let mut t = target(&format!("t-{i}"), "src-1");
        t.url = format!("https://shop.test/p/{i}");
        store.insert_target(t).await;
    }

    let drift = Arc::new(DriftDetector::new(DriftConfig::default()));
    let writer = Arc::new(OfferWriter::new(
        store.clone() as Arc<dyn ScrapeStore>,
        drift,
    ));
    let fetch = Arc::new(FetchPolicy::new(
        HttpClient::new(Default::default()).unwrap(),
        FetchPolicyConfig::default(),
    ));
    fetch.robots().seed(
        "shop.test",
        RobotsRules::deny_all(),
        std::time::Duration::from_secs(3600),
    );

    let metrics = Arc::new(RunMetrics::default());
    let resolver = Arc::new(MemoryResolverQueue::new());
    let worker = ScrapeWorker::new(
        store.clone() as Arc<dyn ScrapeStore>,
        Arc::new(AdapterRegistry::with_builtin_sites().unwrap()),
        fetch,
        writer,
        Arc::new(RunDedupStore::new()),
        resolver.clone() as Arc<dyn ResolverQueue>,
        metrics.clone(),
    );

    // Three robots-blocked fetches cross the window threshold.
    for i in 0..3 {
        let outcome = worker
            .process_job(&ScrapeJob {
                target_id: format!("t-{i}"),
                url: format!("https://shop.test/p/{i}"),
                source_id: "src-1".into(),
                retailer_id: "brass-house".into(),
                adapter_id: "brass-house".into(),
                run_id: "run-1".into(),
                trigger: JobTrigger::Scheduled,
            })
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            JobOutcome::FetchFailed(FetchFailure::RobotsBlocked)
        ));
    }
    let disabled = store.get_source("src-1").await.unwrap().unwrap();
    assert!(!disabled.robots_compliant);
    assert!(!disabled.may_fetch());

    // The fourth job short-circuits before any fetch.
    let outcome = worker
        .process_job(&ScrapeJob {
            target_id: "t-3".into(),
            url: "https://shop.test/p/3".into(),
            source_id: "src-1".into(),
            retailer_id: "brass-house".into(),
            adapter_id: "brass-house".into(),
            run_id: "run-1".into(),
            trigger: JobTrigger::Scheduled,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, JobOutcome::SourceDisabled));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.urls_attempted, 4);
    assert_eq!(snapshot.urls_failed, 4);
    assert!(resolver.is_empty().await);
}
