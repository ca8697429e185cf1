//! Adapter for Brass House Munitions product pages (HTML).

use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use crate::adapters::{
    AdapterManifest, AdapterMode, AdapterRateLimit, ExtractError, RawDocument, SiteAdapter,
};
use crate::domain::{Availability, BallisticFields, PriceCents, RawScrapeOffer};
use crate::pipeline::normalize;

const ADAPTER_VERSION: &str = "1.3.0";

// Static selectors; panicking here is a programming error caught by the
// adapter's fixture tests, not a runtime condition.
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1.product-title").unwrap());
static PRICE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".product-detail span.price").unwrap());
static STOCK: Lazy<Selector> = Lazy::new(|| Selector::parse(".stock-status").unwrap());
static SKU: Lazy<Selector> = Lazy::new(|| Selector::parse(".product-meta .sku").unwrap());
static UPC: Lazy<Selector> = Lazy::new(|| Selector::parse(".product-meta .upc").unwrap());
static PRODUCT_FORM: Lazy<Selector> =
    Lazy::new(|| Selector::parse("form[data-product-id]").unwrap());
static DETAIL: Lazy<Selector> = Lazy::new(|| Selector::parse(".product-detail").unwrap());

pub struct BrassHouseAdapter {
    manifest: AdapterManifest,
}

impl BrassHouseAdapter {
    pub fn new() -> Self {
        Self {
            manifest: AdapterManifest {
                id: "brass-house".into(),
                name: "Brass House Munitions".into(),
                owner: "ingest-team".into(),
                version: ADAPTER_VERSION.into(),
                mode: AdapterMode::Html,
                base_urls: vec!["https://www.brasshousemunitions.com".into()],
                rate_limit: AdapterRateLimit {
                    requests_per_second: 1,
                    min_delay_ms: 1500,
                    max_concurrent: 2,
                },
            },
        }
    }
}

impl Default for BrassHouseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteAdapter for BrassHouseAdapter {
    fn manifest(&self) -> &AdapterManifest {
        &self.manifest
    }

    fn extract(&self, document: &RawDocument, url: &Url) -> Result<RawScrapeOffer, ExtractError> {
        if document.body.trim().is_empty() {
            return Err(ExtractError::EmptyPage);
        }
        let html = Html::parse_document(&document.body);

        if html.select(&DETAIL).next().is_none() {
            return Err(ExtractError::SelectorNotFound(".product-detail".into()));
        }

        let title = html
            .select(&TITLE)
            .next()
            .map(|n| n.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ExtractError::TitleNotFound)?;

        let availability = html
            .select(&STOCK)
            .next()
            .map(|n| Availability::from_retailer_text(&n.text().collect::<String>()))
            .unwrap_or(Availability::Unknown);

        // Collect every price node inside the detail block. Two
        // distinct values with no disambiguation rule is a structure
        // change, never a guess.
        let mut price_texts: Vec<String> = Vec::new();
        for node in html.select(&PRICE) {
            let text = node.text().collect::<String>().trim().to_string();
            if !text.is_empty() && !price_texts.contains(&text) {
                price_texts.push(text);
            }
        }

        let price = match price_texts.len() {
            0 => {
                if availability == Availability::OutOfStock {
                    return Err(ExtractError::OosNoPrice);
                }
                return Err(ExtractError::PriceNotFound);
            }
            1 => Some(normalize::parse_price_cents(&price_texts[0])),
            _ => {
                let mut distinct: Vec<PriceCents> = Vec::new();
                for text in &price_texts {
                    let parsed = normalize::parse_price_cents(text);
                    if !distinct.contains(&parsed) {
                        distinct.push(parsed);
                    }
                }
                if distinct.len() == 1 {
                    Some(distinct[0])
                } else {
                    return Err(ExtractError::PageStructureChanged(format!(
                        "{} distinct prices on one product page",
                        distinct.len()
                    )));
                }
            }
        };

        let retailer_product_id = html
            .select(&PRODUCT_FORM)
            .next()
            .and_then(|n| n.value().attr("data-product-id"))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let retailer_sku = text_of(&html, &SKU);
        let upc = text_of(&html, &UPC);

        Ok(RawScrapeOffer {
            source_id: String::new(), // stamped by the worker from the job
            retailer_id: self.manifest.id.clone(),
            url: url.as_str().to_string(),
            title,
            price,
            availability,
            observed_at: Utc::now(),
            retailer_product_id,
            retailer_sku,
            upc,
            ballistics: BallisticFields::default(),
            adapter_version: ADAPTER_VERSION.into(),
            extraction_notes: Vec::new(),
        })
    }
}

fn text_of(html: &Html, selector: &Selector) -> Option<String> {
    html.select(selector)
        .next()
        .map(|n| n.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}
