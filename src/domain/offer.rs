//! Offer entities produced by adapter extraction and pipeline normalization.
//!
//! `RawScrapeOffer` exists only in memory between extraction and
//! normalization. `NormalizedScrapeOffer` is the canonical shape the
//! validation gate and writer operate on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stock state as conveyed by the retailer page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    InStock,
    OutOfStock,
    Backorder,
    Unknown,
}

impl Availability {
    /// Maps a retailer's free-text availability label onto the enum.
    /// Anything unrecognized is `Unknown` rather than a guess.
    pub fn from_retailer_text(text: &str) -> Self {
        let t = text.trim().to_ascii_lowercase();
        match t.as_str() {
            "in stock" | "instock" | "in_stock" | "available" | "add to cart" => Self::InStock,
            "out of stock" | "outofstock" | "out_of_stock" | "sold out" | "unavailable" => {
                Self::OutOfStock
            }
            "backorder" | "back order" | "backordered" | "pre-order" | "preorder" => {
                Self::Backorder
            }
            _ => Self::Unknown,
        }
    }
}

/// A price in minor currency units, or an explicit marker for price
/// text that existed but could not be trusted. The validation gate
/// rejects the markers; they are never coerced to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cents", rename_all = "snake_case")]
pub enum PriceCents {
    Cents(i64),
    /// Price text was present but did not parse as a money amount.
    Unparsable,
    /// Price text contained multiple distinct numeric amounts with no
    /// rule to choose between them.
    Ambiguous,
}

impl PriceCents {
    pub fn cents(&self) -> Option<i64> {
        match self {
            Self::Cents(c) => Some(*c),
            Self::Unparsable | Self::Ambiguous => None,
        }
    }
}

/// Ballistic attributes parsed from title/description text.
/// Every field is best-effort; out-of-range values are absent, not clamped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BallisticFields {
    pub caliber: Option<String>,
    pub grain_weight: Option<u32>,
    pub round_count: Option<u32>,
    pub case_material: Option<String>,
    pub bullet_type: Option<String>,
}

/// Adapter extraction output, prior to normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScrapeOffer {
    pub source_id: String,
    pub retailer_id: String,
    pub url: String,
    pub title: String,
    pub price: Option<PriceCents>,
    pub availability: Availability,
    pub observed_at: DateTime<Utc>,
    /// Identity signals, in descending match precedence.
    pub retailer_product_id: Option<String>,
    pub retailer_sku: Option<String>,
    pub upc: Option<String>,
    pub ballistics: BallisticFields,
    pub adapter_version: String,
    /// Adapter observations about the page that downstream stages may
    /// act on (e.g. `multi_variant_pricing`). Not identity-bearing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extraction_notes: Vec<String>,
}

/// A raw offer plus its derived identity key and unit economics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedScrapeOffer {
    #[serde(flatten)]
    pub offer: RawScrapeOffer,
    /// Dedup/matching key. Precedence: retailer product id > SKU > URL
    /// hash. Changing this precedence retroactively changes product
    /// matching; it must never be silently altered.
    pub identity_key: String,
    pub cost_per_round_cents: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_mapping() {
        assert_eq!(
            Availability::from_retailer_text("In Stock"),
            Availability::InStock
        );
        assert_eq!(
            Availability::from_retailer_text("SOLD OUT"),
            Availability::OutOfStock
        );
        assert_eq!(
            Availability::from_retailer_text("Backordered"),
            Availability::Backorder
        );
        assert_eq!(
            Availability::from_retailer_text("ships whenever"),
            Availability::Unknown
        );
    }

    #[test]
    fn unparsable_price_has_no_cents() {
        assert_eq!(PriceCents::Unparsable.cents(), None);
        assert_eq!(PriceCents::Cents(2199).cents(), Some(2199));
    }
}
