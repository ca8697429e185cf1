//! Logging initialization.
//!
//! Console output plus a daily-rolling file under the configured log
//! directory. The non-blocking writer guard is parked in a global so
//! the file writer stays alive for the life of the process.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

use super::config::LoggingSettings;

static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Resolves the log directory relative to the current working
/// directory unless an absolute path is configured.
pub fn log_directory(settings: &LoggingSettings) -> PathBuf {
    let configured = PathBuf::from(&settings.log_dir);
    if configured.is_absolute() {
        configured
    } else {
        std::env::current_dir()
            .unwrap_or_default()
            .join(configured)
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured level when set. Safe to call once per process.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .context("Invalid log filter directive")?;

    let console_layer = settings
        .console_output
        .then(|| fmt::layer().with_target(true).with_thread_ids(false));

    let file_layer = if settings.file_output {
        let dir = log_directory(settings);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let appender = rolling::daily(&dir, format!("{}.log", settings.file_name_prefix));
        let (writer, guard) = non_blocking(appender);
        if let Ok(mut guards) = LOG_GUARDS.lock() {
            guards.push(guard);
        }
        Some(fmt::layer().with_ansi(false).with_writer(writer))
    } else {
        None
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Logging already initialized")?;

    tracing::info!(
        level = %settings.level,
        file_output = settings.file_output,
        "logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_log_dir_resolves_under_cwd() {
        let settings = LoggingSettings {
            level: "info".into(),
            console_output: true,
            file_output: false,
            log_dir: "logs".into(),
            file_name_prefix: "ammo-ingest".into(),
        };
        let dir = log_directory(&settings);
        assert!(dir.ends_with("logs"));
        assert!(dir.is_absolute());
    }
}
