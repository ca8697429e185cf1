//! Politeness/compliance fetch layer.
//!
//! Composes the SSRF guard, the fail-closed robots check, and the
//! per-domain rate limiter around one HTTP GET. Every guard returns an
//! explicit deny with a reason and short-circuits before network I/O.
//! Blocked-class responses (robots denial, 403/429/503) are reported
//! distinctly from transport failures because they feed the drift
//! detector's auto-disable logic.

pub mod rate_limit;
pub mod robots;
pub mod ssrf;

use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::adapters::{AdapterRateLimit, RawDocument};
use crate::infrastructure::http_client::HttpClient;

use rate_limit::DomainRateLimiter;
use robots::{RobotsCache, RobotsVerdict};
use ssrf::SsrfRejection;

/// Why a fetch produced no document. Policy refusals are expected
/// outcomes, not exceptions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("SSRF policy rejected URL: {0}")]
    Ssrf(SsrfRejection),
    #[error("disallowed by robots policy")]
    RobotsBlocked,
    #[error("blocked by retailer (HTTP {status})")]
    Blocked { status: u16 },
    #[error("unexpected HTTP status {status}")]
    HttpStatus { status: u16 },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl FetchFailure {
    /// Block-class failures feed the per-source drift window.
    pub fn is_block(&self) -> bool {
        matches!(self, Self::RobotsBlocked | Self::Blocked { .. })
    }
}

/// Fetch-policy tunables sourced from configuration.
#[derive(Debug, Clone)]
pub struct FetchPolicyConfig {
    pub robots_success_ttl: Duration,
    pub robots_failure_ttl: Duration,
}

impl Default for FetchPolicyConfig {
    fn default() -> Self {
        Self {
            robots_success_ttl: Duration::from_secs(24 * 60 * 60),
            robots_failure_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// The composed fetch path used by every worker.
pub struct FetchPolicy {
    http: HttpClient,
    robots: RobotsCache,
    rate_limits: DomainRateLimiter,
}

impl FetchPolicy {
    pub fn new(http: HttpClient, config: FetchPolicyConfig) -> Self {
        let robots = RobotsCache::new(
            http.inner(),
            http.user_agent().to_string(),
            config.robots_success_ttl,
            config.robots_failure_ttl,
        );
        Self {
            http,
            robots,
            rate_limits: DomainRateLimiter::new(),
        }
    }

    /// Runs the guard cascade, waits for a rate-limit slot, and fetches
    /// the document. The first denying guard wins; no network I/O
    /// happens before all guards pass. The parsed URL is returned with
    /// the document so callers never re-parse the job URL.
    pub async fn fetch(
        &self,
        url: &str,
        limits: &AdapterRateLimit,
    ) -> Result<(Url, RawDocument), FetchFailure> {
        let parsed = Url::parse(url).map_err(|e| FetchFailure::InvalidUrl(e.to_string()))?;

        ssrf::check_url(&parsed).map_err(FetchFailure::Ssrf)?;

        if self.robots.check(&parsed).await == RobotsVerdict::Disallowed {
            debug!(url, "robots policy denied fetch");
            return Err(FetchFailure::RobotsBlocked);
        }

        let domain = parsed.host_str().unwrap_or_default().to_string();
        let _permit = self.rate_limits.acquire(&domain, limits).await;

        let response = self
            .http
            .get(parsed.as_str())
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(ToOwned::to_owned);
                let body = response
                    .text()
                    .await
                    .map_err(|e| FetchFailure::Transport(e.to_string()))?;
                Ok((parsed, RawDocument { body, content_type }))
            }
            s @ (403 | 429 | 503) => Err(FetchFailure::Blocked { status: s }),
            s => Err(FetchFailure::HttpStatus { status: s }),
        }
    }

    /// Test/admin access to the robots cache, e.g. for seeding.
    pub fn robots(&self) -> &RobotsCache {
        &self.robots
    }
}
