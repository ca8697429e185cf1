//! Per-retailer adapter contract.
//!
//! An adapter is the only piece of the pipeline that knows one
//! retailer's page structure. It is stateless and versioned, and its
//! `extract` is a pure function of the fetched document so captured
//! fixtures produce deterministic output.

pub mod fixtures;
pub mod registry;
pub mod sites;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::domain::{NormalizedScrapeOffer, RawScrapeOffer};
use crate::pipeline::normalize;
use crate::pipeline::validate::{self, Verdict};

/// Typed extraction failures. Ambiguity must surface as
/// `PageStructureChanged`, never as a guessed value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("product title not found")]
    TitleNotFound,
    #[error("price not found")]
    PriceNotFound,
    /// The page legitimately carries no price because the item is out
    /// of stock. Counted as a success by the worker.
    #[error("out of stock with no listed price")]
    OosNoPrice,
    #[error("selector '{0}' matched nothing")]
    SelectorNotFound(String),
    #[error("page structure changed: {0}")]
    PageStructureChanged(String),
    #[error("empty page body")]
    EmptyPage,
}

/// Transport mode the adapter expects its documents in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterMode {
    Html,
    Json,
}

/// Per-adapter politeness declaration, consumed by the fetch policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdapterRateLimit {
    pub requests_per_second: u32,
    pub min_delay_ms: u64,
    pub max_concurrent: usize,
}

impl Default for AdapterRateLimit {
    fn default() -> Self {
        Self {
            requests_per_second: 1,
            min_delay_ms: 1000,
            max_concurrent: 2,
        }
    }
}

/// Static adapter declaration, registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterManifest {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub version: String,
    pub mode: AdapterMode,
    pub base_urls: Vec<String>,
    #[serde(default)]
    pub rate_limit: AdapterRateLimit,
}

/// A fetched document handed to `extract`. Already decoded to text by
/// the fetch layer; adapters never perform I/O.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub body: String,
    pub content_type: Option<String>,
}

impl RawDocument {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: None,
        }
    }
}

/// Result of adapter-level normalization: the canonical offer plus the
/// gate's verdict on it.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub offer: NormalizedScrapeOffer,
    pub verdict: Verdict,
}

/// The per-retailer plugin contract.
pub trait SiteAdapter: Send + Sync {
    fn manifest(&self) -> &AdapterManifest;

    /// Parses a fetched document into a raw offer. No network or file
    /// I/O: the same document must always yield the same fields (the
    /// `observed_at` stamp excepted), so captured fixtures are
    /// authoritative.
    fn extract(&self, document: &RawDocument, url: &Url) -> Result<RawScrapeOffer, ExtractError>;

    /// Normalizes and validates a raw offer. The default delegates to
    /// the shared gate; adapters with extra domain knowledge (e.g.
    /// multi-variant pages) may override and route to quarantine
    /// themselves.
    fn normalize(&self, offer: RawScrapeOffer) -> NormalizeOutcome {
        let normalized = normalize::normalize_offer(offer);
        let verdict = validate::validate(&normalized);
        NormalizeOutcome {
            offer: normalized,
            verdict,
        }
    }
}
