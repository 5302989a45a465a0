//! # Logging
//!
//! Installs the global `tracing` subscriber: human-readable output on stdout
//! and, when a directory is configured, a daily-rolling plain-text file.
//!
//! `RUST_LOG` takes precedence over the configured level.

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "ground-station.log";

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the program. It is `None` when file logging is disabled.
///
/// # Errors
///
/// Returns error if the level directive is invalid, the log directory
/// cannot be created, or a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.level)?,
    };
    let stdout_layer = fmt::layer().with_target(false);

    let (file_layer, guard) = match &config.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

/// Parse a level or directive list such as `info` or `ground_station=debug,warn`
pub fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{}'", level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            assert!(build_filter(level).is_ok(), "level {} should parse", level);
        }
    }

    #[test]
    fn test_build_filter_accepts_directives() {
        let filter = build_filter("ground_station::link=debug,info").unwrap();
        assert!(filter.to_string().contains("ground_station::link=debug"));
    }
}
