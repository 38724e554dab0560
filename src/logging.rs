//! Structured logging setup.
//!
//! The library itself only emits `tracing` events and spans; installing a
//! subscriber is left to the host. This module offers the subscriber the
//! `fastsite` binary uses:
//!
//! - an `EnvFilter` built from `FASTSITE_LOG_LEVEL` (or `RUST_LOG`) plus any
//!   `FASTSITE_LOG_TARGET_FILTER` directives,
//! - JSON output for production, pretty output for development,
//! - optional non-blocking output through `tracing_appender`.
//!
//! Logs are written to stderr so command output on stdout stays clean.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra filter directives, comma-separated (`fastsite::router=trace`)
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
    /// Write through a background thread
    pub async_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            include_location: false,
            async_logging: false,
        }
    }
}

impl LogConfig {
    /// Parse configuration from `FASTSITE_LOG_*` variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: env::var("FASTSITE_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: env::var("FASTSITE_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            target_filter: env::var("FASTSITE_LOG_TARGET_FILTER").ok(),
            include_location: env::var("FASTSITE_LOG_INCLUDE_LOCATION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.include_location),
            async_logging: env::var("FASTSITE_LOG_ASYNC")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.async_logging),
        }
    }

    /// Verbose configuration for local development
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            include_location: true,
            async_logging: false,
        }
    }

    /// Parsed level; unknown names fall back to INFO
    #[must_use]
    pub fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        if let Some(target_filter) = &self.target_filter {
            for filter in target_filter.split(',').map(str::trim) {
                if filter.is_empty() {
                    continue;
                }
                match filter.parse() {
                    Ok(directive) => env_filter = env_filter.add_directive(directive),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {filter}"),
                }
            }
        }
        env_filter
    }
}

/// Install the global subscriber with `log_level` over the environment config
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(log_level: &str) -> Result<Option<WorkerGuard>> {
    let mut config = LogConfig::from_env();
    config.log_level = log_level.to_string();
    init_logging_with_config(&config)
}

/// Install the global subscriber.
///
/// With `async_logging` the returned guard must be kept alive until exit so
/// buffered lines are flushed.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.async_logging {
        let (nb, guard) = tracing_appender::non_blocking(std::io::stderr());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(nb), Some(guard))
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}
