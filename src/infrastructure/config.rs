//! Configuration loading and management for the ingest worker.
//!
//! Settings are layered: compiled-in defaults, then an optional TOML
//! file, then `AMMO_INGEST_*` environment variables. Every tunable has
//! a default in [`defaults`] so a bare deployment runs without any
//! config file at all.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::adapters::fixtures::FixturePolicy;

/// Complete worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub worker: WorkerSettings,
    pub fetch: FetchSettings,
    pub drift: DriftSettings,
    pub fixtures: FixtureSettings,
    pub logging: LoggingSettings,
}

/// Worker pool sizing and shutdown behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Number of concurrent job workers.
    pub concurrency: usize,
    /// How long to wait for in-flight jobs on shutdown.
    pub shutdown_timeout_seconds: u64,
    /// Idle poll interval when the job queue is empty, in milliseconds.
    pub poll_interval_ms: u64,
}

/// Outbound HTTP and politeness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    /// Cache lifetime for a successfully fetched robots.txt, in seconds.
    pub robots_success_ttl_seconds: u64,
    /// Cache lifetime for a failed robots.txt fetch, in seconds. Kept
    /// short so a transient error does not deny a domain for a day.
    pub robots_failure_ttl_seconds: u64,
}

/// Structural drift thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftSettings {
    /// Consecutive failures before a target is marked broken.
    pub broken_after_failures: u32,
    /// Block responses within the window before a source is disabled.
    pub block_threshold: u32,
    pub block_window_seconds: i64,
}

/// Adapter fixture freshness thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSettings {
    pub warn_age_days: i64,
    pub fail_age_days: i64,
    pub strict: bool,
}

impl FixtureSettings {
    pub fn policy(&self) -> FixturePolicy {
        FixturePolicy {
            warn_age_days: self.warn_age_days,
            fail_age_days: self.fail_age_days,
            strict: self.strict,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: String,
    pub file_name_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker: WorkerSettings {
                concurrency: defaults::WORKER_CONCURRENCY,
                shutdown_timeout_seconds: defaults::SHUTDOWN_TIMEOUT_SECONDS,
                poll_interval_ms: defaults::POLL_INTERVAL_MS,
            },
            fetch: FetchSettings {
                user_agent: defaults::USER_AGENT.to_string(),
                request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
                robots_success_ttl_seconds: defaults::ROBOTS_SUCCESS_TTL_SECONDS,
                robots_failure_ttl_seconds: defaults::ROBOTS_FAILURE_TTL_SECONDS,
            },
            drift: DriftSettings {
                broken_after_failures: defaults::BROKEN_AFTER_FAILURES,
                block_threshold: defaults::BLOCK_THRESHOLD,
                block_window_seconds: defaults::BLOCK_WINDOW_SECONDS,
            },
            fixtures: FixtureSettings {
                warn_age_days: defaults::FIXTURE_WARN_AGE_DAYS,
                fail_age_days: defaults::FIXTURE_FAIL_AGE_DAYS,
                strict: false,
            },
            logging: LoggingSettings {
                level: defaults::LOG_LEVEL.to_string(),
                console_output: true,
                file_output: true,
                log_dir: defaults::LOG_DIR.to_string(),
                file_name_prefix: defaults::LOG_FILE_PREFIX.to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from defaults, an optional file, and the
    /// environment, in that order of precedence (last wins).
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("Failed to serialize built-in defaults")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = config_path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(true),
            );
        } else {
            builder = builder.add_source(
                File::with_name("ammo-ingest")
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            Environment::with_prefix("AMMO_INGEST").separator("__"),
        );

        let config = builder
            .build()
            .context("Failed to assemble configuration")?;
        config
            .try_deserialize()
            .context("Configuration did not match the expected shape")
    }
}

/// Compiled-in defaults. The config file and environment only override
/// these; removing a key from the file falls back here.
pub mod defaults {
    /// Identifies the worker in outbound requests and robots.txt
    /// matching. Contains a contact URL so site operators can reach us.
    pub const USER_AGENT: &str =
        "ammo-ingest/0.4 (+https://ammoingest.dev/bot)";

    pub const WORKER_CONCURRENCY: usize = 4;
    pub const SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;
    pub const POLL_INTERVAL_MS: u64 = 500;

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// A fetched robots.txt is trusted for a day.
    pub const ROBOTS_SUCCESS_TTL_SECONDS: u64 = 24 * 60 * 60;
    /// A failed robots.txt fetch denies the domain, but only briefly.
    pub const ROBOTS_FAILURE_TTL_SECONDS: u64 = 15 * 60;

    /// Consecutive target failures before auto-disable.
    pub const BROKEN_AFTER_FAILURES: u32 = 5;
    /// Block responses within the window before source auto-disable.
    pub const BLOCK_THRESHOLD: u32 = 3;
    pub const BLOCK_WINDOW_SECONDS: i64 = 300;

    pub const FIXTURE_WARN_AGE_DAYS: i64 = 90;
    pub const FIXTURE_FAIL_AGE_DAYS: i64 = 365;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_DIR: &str = "logs";
    pub const LOG_FILE_PREFIX: &str = "ammo-ingest";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_load_without_a_config_file() {
        let config = AppConfig::default();
        assert_eq!(config.worker.concurrency, defaults::WORKER_CONCURRENCY);
        assert_eq!(config.drift.broken_after_failures, 5);
        assert_eq!(config.fetch.user_agent, defaults::USER_AGENT);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[worker]\nconcurrency = 12").unwrap();
        writeln!(file, "[drift]\nblock_threshold = 7").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.worker.concurrency, 12);
        assert_eq!(config.drift.block_threshold, 7);
        // Untouched keys keep their defaults.
        assert_eq!(
            config.fetch.request_timeout_seconds,
            defaults::REQUEST_TIMEOUT_SECONDS
        );
    }

    #[test]
    fn fixture_settings_convert_to_policy() {
        let config = AppConfig::default();
        let policy = config.fixtures.policy();
        assert_eq!(policy.warn_age_days, defaults::FIXTURE_WARN_AGE_DAYS);
        assert!(!policy.strict);
    }
}
