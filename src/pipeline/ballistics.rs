//! Ballistic attribute extraction from retailer free text.
//!
//! A best-effort regex cascade over title and description text, with
//! hard numeric gates. Out-of-range values are treated as absent and
//! never clamped. Caliber extraction resolves textual variants to one
//! canonical label per family while keeping technically distinct
//! calibers such as .223 Remington and 5.56 NATO separate.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::BallisticFields;

/// Grain weights outside this range are not plausible ammunition and
/// are discarded.
pub const GRAIN_WEIGHT_RANGE: (u32, u32) = (15, 750);
/// Pack sizes outside this range are not plausible retail listings.
pub const ROUND_COUNT_RANGE: (u32, u32) = (5, 10_000);

/// Ordered caliber table: first match wins, so more specific patterns
/// (5.56 NATO, .380 ACP, 9x18 Makarov) sit above the families they
/// could otherwise be swallowed by.
static CALIBER_TABLE: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let table: &[(&str, &str)] = &[
        (r"(?i)\b5\.56(?:\s*x\s*45)?(?:\s*mm)?(?:\s*nato)?", "5.56 NATO"),
        (r"(?i)(?:\b|\.)223\s*(?:rem(?:ington)?|wylde)?\b", ".223 Remington"),
        (r"(?i)\b9\s*x\s*18\b|\b9\s*mm\s*makarov\b", "9mm Makarov"),
        (r"(?i)\b9\s*mm(?:\s*luger)?\b|\b9\s*x\s*19\b", "9mm Luger"),
        (r"(?i)(?:\b|\.)380(?:\s*(?:acp|auto))?\b", ".380 ACP"),
        (r"(?i)(?:\b|\.)38\s*(?:spl|special)\b", ".38 Special"),
        (r"(?i)(?:\b|\.)357\s*sig\b", ".357 SIG"),
        (r"(?i)(?:\b|\.)357(?:\s*mag(?:num)?)?\b", ".357 Magnum"),
        (r"(?i)(?:\b|\.)45\s*(?:acp|auto)\b", ".45 ACP"),
        (r"(?i)(?:\b|\.)45\s*(?:long\s*)?colt\b", ".45 Colt"),
        (r"(?i)(?:\b|\.)40\s*(?:cal\b|s\s*&\s*w)", ".40 S&W"),
        (r"(?i)\b10\s*mm(?:\s*auto)?\b", "10mm Auto"),
        (r"(?i)\b7\.62\s*x\s*51(?:\s*mm)?(?:\s*nato)?", "7.62x51 NATO"),
        (r"(?i)\b7\.62\s*x\s*39\b", "7.62x39"),
        (r"(?i)\b5\.45\s*x\s*39\b", "5.45x39"),
        (r"(?i)(?:\b|\.)308(?:\s*win(?:chester)?)?\b", ".308 Winchester"),
        (r"(?i)(?:\b|\.)30-06\b", ".30-06 Springfield"),
        (r"(?i)(?:\b|\.)300\s*(?:aac\s*)?(?:blackout|blk)\b", ".300 Blackout"),
        (r"(?i)\b6\.5\s*(?:creedmoor|cm)\b", "6.5 Creedmoor"),
        (r"(?i)(?:\b|\.)22\s*(?:lr|long\s*rifle)\b", ".22 LR"),
        (r"(?i)\b12\s*ga(?:uge)?\b", "12 Gauge"),
        (r"(?i)\b20\s*ga(?:uge)?\b", "20 Gauge"),
    ];
    table
        .iter()
        .map(|(pattern, label)| (Regex::new(pattern).unwrap(), *label))
        .collect()
});

static GRAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,4})\s*(?:gr|grain|grains)\b").unwrap());

static ROUNDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,5})\s*[- ]?(?:rds?|rnds?|rounds?|ct|count)\b").unwrap()
});

static PACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:box|case|pack)\s+of\s+(\d{1,5})\b").unwrap());

static CASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(brass|steel|aluminum|nickel[- ]plated)\b").unwrap()
});

static BULLET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fmj|jhp|tmj|bthp|otm|sjhp|lrn|hp|sp|v-max|ballistic tip)\b").unwrap()
});

/// Resolves a caliber mention in `text` to its canonical label, or
/// `None` when no known family matches.
pub fn canonical_caliber(text: &str) -> Option<&'static str> {
    CALIBER_TABLE
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, label)| *label)
}

/// Grain weight, gated to a plausible ammunition range.
pub fn grain_weight(text: &str) -> Option<u32> {
    let value: u32 = GRAIN_RE.captures(text)?.get(1)?.as_str().parse().ok()?;
    in_range(value, GRAIN_WEIGHT_RANGE)
}

/// Retail pack size, gated to a plausible range.
pub fn round_count(text: &str) -> Option<u32> {
    let value: u32 = ROUNDS_RE
        .captures(text)
        .or_else(|| PACK_RE.captures(text))?
        .get(1)?
        .as_str()
        .parse()
        .ok()?;
    in_range(value, ROUND_COUNT_RANGE)
}

pub fn case_material(text: &str) -> Option<String> {
    CASE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| titlecase_token(m.as_str()))
}

pub fn bullet_type(text: &str) -> Option<String> {
    BULLET_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
}

/// Fills only the fields the adapter left empty; adapter-supplied
/// values always win over text inference.
pub fn fill_missing(fields: &mut BallisticFields, text: &str) {
    if fields.caliber.is_none() {
        fields.caliber = canonical_caliber(text).map(Into::into);
    }
    if fields.grain_weight.is_none() {
        fields.grain_weight = grain_weight(text);
    }
    if fields.round_count.is_none() {
        fields.round_count = round_count(text);
    }
    if fields.case_material.is_none() {
        fields.case_material = case_material(text);
    }
    if fields.bullet_type.is_none() {
        fields.bullet_type = bullet_type(text);
    }
}

fn in_range(value: u32, (lo, hi): (u32, u32)) -> Option<u32> {
    (lo..=hi).contains(&value).then_some(value)
}

fn titlecase_token(token: &str) -> String {
    let lower = token.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("9mm Luger 115gr", "9mm Luger")]
    #[case("9mm", "9mm Luger")]
    #[case("9x19", "9mm Luger")]
    #[case("9 MM", "9mm Luger")]
    #[case("Federal 9 mm FMJ", "9mm Luger")]
    fn nine_mil_variants_share_one_label(#[case] text: &str, #[case] label: &str) {
        assert_eq!(canonical_caliber(text), Some(label));
    }

    #[test]
    fn two_two_three_and_five_five_six_stay_distinct() {
        assert_eq!(canonical_caliber(".223 Remington"), Some(".223 Remington"));
        assert_eq!(canonical_caliber("5.56 NATO"), Some("5.56 NATO"));
        assert_eq!(canonical_caliber("5.56x45mm"), Some("5.56 NATO"));
        assert_ne!(
            canonical_caliber(".223 Remington"),
            canonical_caliber("5.56 NATO")
        );
    }

    #[rstest]
    #[case(".380 Auto", ".380 ACP")]
    #[case(".38 Special", ".38 Special")]
    #[case(".357 SIG", ".357 SIG")]
    #[case(".357 Magnum", ".357 Magnum")]
    #[case("45 ACP", ".45 ACP")]
    #[case("7.62x39", "7.62x39")]
    #[case("7.62x51 NATO", "7.62x51 NATO")]
    #[case("12 Gauge 00 Buck", "12 Gauge")]
    fn lookalike_calibers_resolve_separately(#[case] text: &str, #[case] label: &str) {
        assert_eq!(canonical_caliber(text), Some(label));
    }

    #[test]
    fn unknown_caliber_is_absent() {
        assert_eq!(canonical_caliber("cleaning kit for all calibers"), None);
    }

    #[test]
    fn grain_weight_gate_rejects_out_of_range() {
        assert_eq!(grain_weight("115gr FMJ"), Some(115));
        assert_eq!(grain_weight("5 grain"), None);
        assert_eq!(grain_weight("1000 grain"), None);
        assert_eq!(grain_weight("no weight here"), None);
    }

    #[test]
    fn round_count_gate_rejects_out_of_range() {
        assert_eq!(round_count("50 rounds"), Some(50));
        assert_eq!(round_count("box of 1000"), Some(1000));
        assert_eq!(round_count("2 rounds"), None);
        assert_eq!(round_count("20000 rounds"), None);
    }

    #[test]
    fn adapter_values_win_over_text_inference() {
        let mut fields = BallisticFields {
            caliber: Some("10mm Auto".into()),
            ..Default::default()
        };
        fill_missing(&mut fields, "9mm Luger 115gr FMJ 50 rounds brass");
        assert_eq!(fields.caliber.as_deref(), Some("10mm Auto"));
        assert_eq!(fields.grain_weight, Some(115));
        assert_eq!(fields.round_count, Some(50));
        assert_eq!(fields.case_material.as_deref(), Some("Brass"));
        assert_eq!(fields.bullet_type.as_deref(), Some("FMJ"));
    }
}
