//! Adapter for Ammo Lake Outfitters (JSON product endpoint).
//!
//! Ammo Lake serves product data as JSON. Multi-variant listings price
//! only the base variant, so this adapter routes them to quarantine
//! itself instead of letting the shared gate accept a misleading price.

use chrono::Utc;
use serde::Deserialize;
use url::Url;

use crate::adapters::{
    AdapterManifest, AdapterMode, AdapterRateLimit, ExtractError, NormalizeOutcome, RawDocument,
    SiteAdapter,
};
use crate::domain::{Availability, BallisticFields, RawScrapeOffer};
use crate::pipeline::normalize;
use crate::pipeline::validate::{self, QuarantineReason, Verdict};

const ADAPTER_VERSION: &str = "2.0.1";
const MULTI_VARIANT_NOTE: &str = "multi_variant_pricing";

#[derive(Debug, Deserialize)]
struct ProductDoc {
    product: ProductBody,
}

#[derive(Debug, Deserialize)]
struct ProductBody {
    id: Option<String>,
    sku: Option<String>,
    upc: Option<String>,
    name: Option<String>,
    price: Option<String>,
    stock_status: Option<String>,
    #[serde(default)]
    variants: Vec<Variant>,
}

#[derive(Debug, Deserialize)]
struct Variant {
    #[serde(default)]
    price: Option<String>,
}

pub struct AmmoLakeAdapter {
    manifest: AdapterManifest,
}

impl AmmoLakeAdapter {
    pub fn new() -> Self {
        Self {
            manifest: AdapterManifest {
                id: "ammo-lake".into(),
                name: "Ammo Lake Outfitters".into(),
                owner: "ingest-team".into(),
                version: ADAPTER_VERSION.into(),
                mode: AdapterMode::Json,
                base_urls: vec!["https://www.ammolake.com".into()],
                rate_limit: AdapterRateLimit {
                    requests_per_second: 2,
                    min_delay_ms: 500,
                    max_concurrent: 3,
                },
            },
        }
    }

    /// A listing is multi-variant when variants carry their own,
    /// differing prices; the top-level price covers the base variant
    /// only.
    fn has_divergent_variants(body: &ProductBody) -> bool {
        let mut prices: Vec<&str> = Vec::new();
        for variant in &body.variants {
            if let Some(p) = variant.price.as_deref() {
                if !prices.contains(&p) {
                    prices.push(p);
                }
            }
        }
        if let Some(base) = body.price.as_deref() {
            if !prices.is_empty() && !prices.contains(&base) {
                return true;
            }
        }
        prices.len() > 1
    }
}

impl Default for AmmoLakeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteAdapter for AmmoLakeAdapter {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    fn extract(&self, document: &RawDocument, url: &Url) -> Result<RawScrapeOffer, ExtractError> {
        if document.body.trim().is_empty() {
            return Err(ExtractError::EmptyPage);
        }
        let doc: ProductDoc = serde_json::from_str(&document.body)
            .map_err(|e| ExtractError::PageStructureChanged(format!("invalid JSON: {e}")))?;
        let body = doc.product;

        let title = body
            .name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ExtractError::TitleNotFound)?
            .to_string();

        let availability = body
            .stock_status
            .as_deref()
            .map(Availability::from_retailer_text)
            .unwrap_or(Availability::Unknown);

        let multi_variant = Self::has_divergent_variants(&body);

        let price = match body.price.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(text) => Some(normalize::parse_price_cents(text)),
            None if availability == Availability::OutOfStock => {
                return Err(ExtractError::OosNoPrice)
            }
            None => return Err(ExtractError::PriceNotFound),
        };

        let offer = RawScrapeOffer {
            source_id: String::new(),
            retailer_id: self.manifest.id.clone(),
            url: url.as_str().to_string(),
            title,
            price,
            availability,
            observed_at: Utc::now(),
            retailer_product_id: clean(body.id),
            retailer_sku: clean(body.sku),
            upc: clean(body.upc),
            ballistics: BallisticFields::default(),
            adapter_version: ADAPTER_VERSION.into(),
            extraction_notes: if multi_variant {
                vec![MULTI_VARIANT_NOTE.to_string()]
            } else {
                Vec::new()
            },
        };
        Ok(offer)
    }

    /// Multi-variant listings price only the base variant; even a
    /// cleanly parsed price needs human confirmation.
    fn normalize(&self, offer: RawScrapeOffer) -> NormalizeOutcome {
        let multi_variant = offer
            .extraction_notes
            .iter()
            .any(|n| n == MULTI_VARIANT_NOTE);
        let normalized = normalize::normalize_offer(offer);
        let mut verdict = validate::validate(&normalized);
        if multi_variant && verdict == Verdict::Accept {
            verdict = Verdict::Quarantine(vec![QuarantineReason::AmbiguousPrice]);
        }
        NormalizeOutcome {
            offer: normalized,
            verdict,
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceCents;

    fn url() -> Url {
        Url::parse("https://www.ammolake.com/api/products/5561").unwrap()
    }

    const IN_STOCK_JSON: &str = r#"{
        "product": {
            "id": "AL-5561",
            "sku": "WIN-556-55",
            "upc": "020892212345",
            "name": "Winchester 5.56 NATO 55gr FMJ 200 rounds",
            "price": "94.99",
            "stock_status": "in_stock",
            "variants": []
        }
    }"#;

    #[test]
    fn extracts_json_product() {
        let adapter = AmmoLakeAdapter::new();
        let offer = adapter
            .extract(&RawDocument::new(IN_STOCK_JSON), &url())
            .unwrap();
        assert_eq!(offer.price, Some(PriceCents::Cents(9499)));
        assert_eq!(offer.availability, Availability::InStock);
        assert_eq!(offer.retailer_product_id.as_deref(), Some("AL-5561"));
        assert_eq!(offer.upc.as_deref(), Some("020892212345"));
    }

    #[test]
    fn malformed_json_is_a_structure_change() {
        let adapter = AmmoLakeAdapter::new();
        assert!(matches!(
            adapter.extract(&RawDocument::new("<html>not json</html>"), &url()),
            Err(ExtractError::PageStructureChanged(_))
        ));
    }

    #[test]
    fn out_of_stock_without_price_is_typed() {
        let body = r#"{"product": {"name": "Winchester 5.56", "stock_status": "sold out"}}"#;
        let adapter = AmmoLakeAdapter::new();
        assert_eq!(
            adapter.extract(&RawDocument::new(body), &url()),
            Err(ExtractError::OosNoPrice)
        );
    }

    #[test]
    fn divergent_variants_route_to_quarantine_in_normalize() {
        let body = r#"{
            "product": {
                "id": "AL-9001",
                "name": "CCI 9mm Luger 115gr 50 rounds",
                "price": "13.99",
                "stock_status": "in_stock",
                "variants": [{"price": "13.99"}, {"price": "119.99"}]
            }
        }"#;
        let adapter = AmmoLakeAdapter::new();
        let offer = adapter.extract(&RawDocument::new(body), &url()).unwrap();
        let outcome = adapter.normalize(offer);
        assert_eq!(
            outcome.verdict,
            Verdict::Quarantine(vec![QuarantineReason::AmbiguousPrice])
        );
    }

    #[test]
    fn single_variant_listing_passes_the_gate() {
        let adapter = AmmoLakeAdapter::new();
        let offer = adapter
            .extract(&RawDocument::new(IN_STOCK_JSON), &url())
            .unwrap();
        let outcome = adapter.normalize(offer);
        assert_eq!(outcome.verdict, Verdict::Accept);
        assert_eq!(outcome.offer.identity_key, "PID:AL-5561");
    }
}
