//! ammo-ingest: scrape ingestion pipeline for ammunition retailer
//! price data.
//!
//! Turns a retailer product URL into a provenance-tagged price
//! observation through a fetch → extract → normalize/validate →
//! dedupe → write pipeline, with per-retailer adapter plugins, a
//! fail-closed politeness layer (robots, SSRF, per-domain rate
//! limits), and self-healing target/source health tracking.

pub mod adapters;
pub mod domain;
pub mod fetch;
pub mod infrastructure;
pub mod pipeline;
