//! Offer normalization: price text to minor units, identity key
//! derivation, and unit economics.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{NormalizedScrapeOffer, PriceCents, RawScrapeOffer};

use super::ballistics;

static MONEY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?").unwrap());

/// Parses retailer price text to minor currency units.
///
/// Strips currency symbols and thousands separators. Text with no
/// numeric amount is `Unparsable`; text with several distinct amounts
/// and no disambiguation rule is `Ambiguous`. Neither is ever coerced
/// to zero.
pub fn parse_price_cents(text: &str) -> PriceCents {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return PriceCents::Unparsable;
    }

    let mut amounts: Vec<i64> = Vec::new();
    for token in MONEY_TOKEN.find_iter(cleaned) {
        let raw = token.as_str().replace(',', "");
        if let Some(cents) = decimal_to_cents(&raw) {
            if !amounts.contains(&cents) {
                amounts.push(cents);
            }
        }
    }

    match amounts.as_slice() {
        [] => PriceCents::Unparsable,
        [one] => PriceCents::Cents(*one),
        _ => PriceCents::Ambiguous,
    }
}

fn decimal_to_cents(raw: &str) -> Option<i64> {
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    let whole: i64 = whole.parse().ok()?;
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        2 => frac.parse().ok()?,
        _ => return None,
    };
    Some(whole * 100 + frac_cents)
}

/// Canonicalizes a URL for identity hashing: lowercased scheme and
/// host, fragment dropped, tracking parameters dropped, trailing slash
/// trimmed. Stable across repeated calls by construction.
pub fn canonicalize_url(url: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.trim().to_string();
    };
    parsed.set_fragment(None);
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && k != "ref" && k != "gclid")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let query: String = kept
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        parsed.set_query(Some(&query));
    }
    parsed.as_str().trim_end_matches('/').to_string()
}

/// Derives the identity key with fixed precedence:
/// retailer product id > retailer SKU > hash of the canonical URL.
///
/// This precedence is an invariant. Changing it retroactively changes
/// product matching across every source.
pub fn identity_key(offer: &RawScrapeOffer) -> String {
    if let Some(pid) = offer
        .retailer_product_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return format!("PID:{pid}");
    }
    if let Some(sku) = offer
        .retailer_sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return format!("SKU:{sku}");
    }
    let canonical = canonicalize_url(&offer.url);
    let digest = blake3::hash(canonical.as_bytes());
    format!("URL:{}", &digest.to_hex()[..16])
}

/// Converts a raw offer to the canonical normalized shape: identity
/// key, ballistic fields filled from the title where the adapter left
/// them empty, and cost per round when both inputs exist.
pub fn normalize_offer(mut raw: RawScrapeOffer) -> NormalizedScrapeOffer {
    ballistics::fill_missing(&mut raw.ballistics, &raw.title);

    let identity_key = identity_key(&raw);
    let cost_per_round_cents = match (raw.price, raw.ballistics.round_count) {
        (Some(PriceCents::Cents(cents)), Some(rounds)) if cents > 0 && rounds > 0 => {
            Some(cents / rounds as i64)
        }
        _ => None,
    };

    NormalizedScrapeOffer {
        offer: raw,
        identity_key,
        cost_per_round_cents,
    }
}
