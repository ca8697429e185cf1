//! Per-domain rate limiting.
//!
//! Three independent brakes per domain, all declared in the adapter
//! manifest: a token quota (requests per second), a minimum
//! inter-request delay, and a concurrent-request cap. Acquisition is
//! the pipeline's only intentional suspension point.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::adapters::AdapterRateLimit;

struct DomainEntry {
    quota: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    concurrency: Arc<Semaphore>,
    min_delay: Duration,
    last_request: tokio::sync::Mutex<Option<Instant>>,
}

impl DomainEntry {
    fn new(limits: &AdapterRateLimit) -> Self {
        let rps = NonZeroU32::new(limits.requests_per_second.max(1)).unwrap();
        Self {
            quota: RateLimiter::direct(Quota::per_second(rps)),
            concurrency: Arc::new(Semaphore::new(limits.max_concurrent.max(1))),
            min_delay: Duration::from_millis(limits.min_delay_ms),
            last_request: tokio::sync::Mutex::new(None),
        }
    }
}

/// Held for the duration of one request; releasing it frees the
/// domain's concurrency slot.
pub struct DomainPermit {
    _permit: OwnedSemaphorePermit,
}

/// Shared store of per-domain limiters. Limits are fixed by the first
/// manifest that mentions the domain; one adapter owns one domain.
#[derive(Default)]
pub struct DomainRateLimiter {
    domains: Mutex<HashMap<String, Arc<DomainEntry>>>,
}

impl DomainRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the domain has a free concurrency slot, a quota
    /// token, and the minimum inter-request delay has elapsed.
    pub async fn acquire(&self, domain: &str, limits: &AdapterRateLimit) -> DomainPermit {
        let entry = self.entry(domain, limits);

        let permit = Arc::clone(&entry.concurrency)
            .acquire_owned()
            .await
            .expect("domain semaphore never closed");
        entry.quota.until_ready().await;

        // Min-delay bookkeeping holds the lock across the sleep so
        // concurrent requests to the same domain space out correctly.
        let mut last = entry.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < entry.min_delay {
                tokio::time::sleep(entry.min_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
        drop(last);

        DomainPermit { _permit: permit }
    }

    fn entry(&self, domain: &str, limits: &AdapterRateLimit) -> Arc<DomainEntry> {
        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            domains
                .entry(domain.to_string())
                .or_insert_with(|| Arc::new(DomainEntry::new(limits))),
        )
    }
}
