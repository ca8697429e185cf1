//! Adapter fixture contract.
//!
//! Every adapter ships captured pages for its tests: at least one
//! in-stock, one out-of-stock, and one structurally malformed fixture,
//! each tagged with where and when it was captured. Stale fixtures
//! warn past one threshold and, in strict mode, fail validation past a
//! harder one. A green adapter test against a two-year-old page proves
//! nothing about today's site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    InStock,
    OutOfStock,
    Malformed,
}

/// One captured page plus its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub kind: FixtureKind,
    pub body: String,
    pub captured_from: String,
    pub captured_at: DateTime<Utc>,
}

/// Freshness thresholds, in days, sourced from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixturePolicy {
    pub warn_age_days: i64,
    pub fail_age_days: i64,
    /// In strict mode a fixture past `fail_age_days` fails validation
    /// instead of warning.
    pub strict: bool,
}

impl Default for FixturePolicy {
    fn default() -> Self {
        Self {
            warn_age_days: 90,
            fail_age_days: 365,
            strict: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FixtureError {
    #[error("adapter '{adapter}' is missing a {kind:?} fixture")]
    MissingKind {
        adapter: String,
        kind: FixtureKind,
    },
    #[error("fixture captured from {captured_from} is {age_days} days old (limit {limit_days})")]
    TooOld {
        captured_from: String,
        age_days: i64,
        limit_days: i64,
    },
}

/// Non-fatal freshness findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureWarning {
    pub captured_from: String,
    pub age_days: i64,
}

/// An adapter's fixture set under validation.
#[derive(Debug, Clone)]
pub struct FixtureSet {
    pub adapter_id: String,
    pub fixtures: Vec<Fixture>,
}

impl FixtureSet {
    /// Checks completeness and freshness at `now`. Returns warnings for
    /// fixtures past the warn threshold; errors when a required kind is
    /// missing or, in strict mode, a fixture is past the fail threshold.
    pub fn validate(
        &self,
        policy: &FixturePolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<FixtureWarning>, FixtureError> {
        for kind in [
            FixtureKind::InStock,
            FixtureKind::OutOfStock,
            FixtureKind::Malformed,
        ] {
            if !self.fixtures.iter().any(|f| f.kind == kind) {
                return Err(FixtureError::MissingKind {
                    adapter: self.adapter_id.clone(),
                    kind,
                });
            }
        }

        let mut warnings = Vec::new();
        for fixture in &self.fixtures {
            let age_days = (now - fixture.captured_at).num_days();
            if policy.strict && age_days > policy.fail_age_days {
                return Err(FixtureError::TooOld {
                    captured_from: fixture.captured_from.clone(),
                    age_days,
                    limit_days: policy.fail_age_days,
                });
            }
            if age_days > policy.warn_age_days {
                tracing::warn!(
                    adapter = %self.adapter_id,
                    captured_from = %fixture.captured_from,
                    age_days,
                    "fixture is stale"
                );
                warnings.push(FixtureWarning {
                    captured_from: fixture.captured_from.clone(),
                    age_days,
                });
            }
        }
        Ok(warnings)
    }
}
