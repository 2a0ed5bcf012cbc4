//! Diagnostics setup for the binary.
//!
//! Logs go to stderr so the report on stdout stays clean. The filter is read
//! from `CLASSOPT_LOG` (any `EnvFilter` directive, default `warn`) and the
//! layout from `CLASSOPT_LOG_FORMAT` (`pretty` or `compact`, default
//! `compact`).

use std::env;
use std::io;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "CLASSOPT_LOG";
pub const LOG_FORMAT_ENV: &str = "CLASSOPT_LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Invalid CLASSOPT_LOG_FORMAT '{0}' (expected 'pretty' or 'compact')")]
    InvalidFormat(String),

    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self, LoggingError> {
        if value.eq_ignore_ascii_case("pretty") {
            Ok(Self::Pretty)
        } else if value.eq_ignore_ascii_case("compact") {
            Ok(Self::Compact)
        } else {
            Err(LoggingError::InvalidFormat(value.to_string()))
        }
    }
}

/// Build the filter for `level`; `off` silences everything.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if level.eq_ignore_ascii_case("off") {
        return Ok(EnvFilter::default().add_directive(LevelFilter::OFF.into()));
    }
    EnvFilter::try_new(level).map_err(|err| LoggingError::InvalidFilter {
        filter: level.to_string(),
        reason: err.to_string(),
    })
}

/// Install the global subscriber.
///
/// `level` overrides `CLASSOPT_LOG`. Returns `false` when a subscriber was
/// already installed.
pub fn init_logging(level: Option<&str>) -> Result<bool, LoggingError> {
    if tracing::dispatcher::has_been_set() {
        return Ok(false);
    }

    let level_value = level
        .map(str::to_string)
        .or_else(|| env::var(LOG_ENV).ok())
        .unwrap_or_else(|| "warn".to_string());
    let filter = build_filter(&level_value)?;

    let format = env::var(LOG_FORMAT_ENV)
        .map(|value| LogFormat::parse(&value))
        .unwrap_or(Ok(LogFormat::Compact))?;

    let base = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Pretty => base
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr).pretty())
            .try_init(),
        LogFormat::Compact => base
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .try_init(),
    };
    installed.map_err(|err| LoggingError::Init(err.to_string()))?;

    Ok(true)
}
