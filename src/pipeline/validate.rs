//! Fail-closed validation gate.
//!
//! Every normalized offer is classified as accepted, dropped (excluded,
//! not persisted), or quarantined (persisted for human review, never
//! consumer-visible). The drift classification table below is explicit
//! configuration: every reason is assigned to counts / does-not-count,
//! nothing is inferred.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Availability, NormalizedScrapeOffer, PriceCents};

/// Definitively invalid data. Dropped offers are not persisted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropReason {
    #[error("title missing after normalization")]
    TitleMissing,
    #[error("negative price")]
    NegativePrice,
    /// No price at all. A legitimate out-of-stock page without a price
    /// never reaches the gate; extraction reports it as `OosNoPrice`.
    #[error("no price extracted")]
    PriceMissing,
}

impl DropReason {
    /// Stable wire code, matching the serde rename.
    pub fn code(self) -> &'static str {
        match self {
            Self::TitleMissing => "TITLE_MISSING",
            Self::NegativePrice => "NEGATIVE_PRICE",
            Self::PriceMissing => "PRICE_MISSING",
        }
    }
}

/// Plausibly valid data that needs human confirmation. Quarantined
/// offers are persisted via the quarantine upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuarantineReason {
    #[error("price text did not parse")]
    PriceParseFailed,
    #[error("multiple distinct prices with no disambiguation rule")]
    AmbiguousPrice,
    #[error("zero price")]
    ZeroPrice,
    #[error("availability could not be determined")]
    UnknownAvailability,
}

impl QuarantineReason {
    /// Stable wire code, persisted with quarantine records.
    pub fn code(self) -> &'static str {
        match self {
            Self::PriceParseFailed => "PRICE_PARSE_FAILED",
            Self::AmbiguousPrice => "AMBIGUOUS_PRICE",
            Self::ZeroPrice => "ZERO_PRICE",
            Self::UnknownAvailability => "UNKNOWN_AVAILABILITY",
        }
    }
}

/// Gate output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Drop(DropReason),
    /// Ordered blocking reasons, persisted with the quarantine record.
    Quarantine(Vec<QuarantineReason>),
}

/// Pure acceptance rule. Missing data is never fabricated: a price
/// marked unparsable or ambiguous stays rejected, never coerced.
pub fn validate(offer: &NormalizedScrapeOffer) -> Verdict {
    let raw = &offer.offer;

    if raw.title.trim().is_empty() {
        return Verdict::Drop(DropReason::TitleMissing);
    }
    if let Some(PriceCents::Cents(cents)) = raw.price {
        if cents < 0 {
            return Verdict::Drop(DropReason::NegativePrice);
        }
    }
    if raw.price.is_none() {
        return Verdict::Drop(DropReason::PriceMissing);
    }

    let mut reasons = Vec::new();
    match raw.price {
        Some(PriceCents::Unparsable) => reasons.push(QuarantineReason::PriceParseFailed),
        Some(PriceCents::Ambiguous) => reasons.push(QuarantineReason::AmbiguousPrice),
        Some(PriceCents::Cents(0)) => reasons.push(QuarantineReason::ZeroPrice),
        _ => {}
    }
    if raw.availability == Availability::Unknown {
        reasons.push(QuarantineReason::UnknownAvailability);
    }

    if reasons.is_empty() {
        Verdict::Accept
    } else {
        Verdict::Quarantine(reasons)
    }
}

/// Whether a drop increments the target's consecutive-failure counter.
///
/// Fixed table, reviewed with the domain owner; do not derive this from
/// reason semantics at call sites.
pub fn drop_counts_toward_drift(reason: DropReason) -> bool {
    match reason {
        DropReason::TitleMissing => true,
        DropReason::NegativePrice => true,
        DropReason::PriceMissing => true,
    }
}

/// Whether a quarantine increments the target's consecutive-failure
/// counter. Parse-level failures point at adapter drift; value-level
/// oddities on an otherwise well-parsed page do not.
pub fn quarantine_counts_toward_drift(reason: QuarantineReason) -> bool {
    match reason {
        QuarantineReason::PriceParseFailed => true,
        QuarantineReason::AmbiguousPrice => true,
        QuarantineReason::ZeroPrice => false,
        QuarantineReason::UnknownAvailability => false,
    }
}

/// A quarantine verdict counts toward drift when any of its reasons do.
pub fn quarantine_reasons_count_toward_drift(reasons: &[QuarantineReason]) -> bool {
    reasons
        .iter()
        .any(|r| quarantine_counts_toward_drift(*r))
}
