//! Structured logging using the tracing crate
//!
//! ## Log Format Options
//!
//! - `json` - Structured JSON for production and log aggregation
//! - `pretty` - Human-readable with colors and indentation
//! - `compact` - Terminal-friendly with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! The `[logging]` config section provides the base settings; these override it:
//!
//! - `TOBY_LOG_LEVEL`: ERROR, WARN, INFO, DEBUG or TRACE
//! - `TOBY_LOG_FORMAT`: json, pretty or compact
//! - `TOBY_LOG_SPANS`: include span open/close events (true/false)
//! - `RUST_LOG`: replaces the filter entirely (env_logger syntax)
//!
//! ```bash
//! TOBY_LOG_FORMAT=compact TOBY_LOG_LEVEL=DEBUG toby run --follow news
//! ```

use crate::config::LoggingSection;
use std::env;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// Parse log format from string; unknown values fall back to JSON
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Parse a level name, defaulting to INFO
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" | "WARNING" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Resolved logging settings
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self::from_section(&LoggingSection::default())
    }
}

impl LogSettings {
    pub fn from_section(section: &LoggingSection) -> Self {
        Self {
            level: parse_level(&section.level),
            format: LogFormat::parse(&section.format),
            include_spans: section.spans,
        }
    }

    /// Apply `TOBY_LOG_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("TOBY_LOG_LEVEL") {
            self.level = parse_level(&level);
        }
        if let Some(format) = lookup("TOBY_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
        if let Some(spans) = lookup("TOBY_LOG_SPANS") {
            self.include_spans = spans.trim().eq_ignore_ascii_case("true");
        }
        self
    }
}

fn build_filter(level: Level) -> EnvFilter {
    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }

    let filter = EnvFilter::new(level.to_string());
    // rumqttc logs every ping at debug
    match "rumqttc=warn".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn span_events(include_spans: bool) -> FmtSpan {
    if include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(settings: &LogSettings) -> Result<(), TryInitError> {
    let subscriber = tracing_subscriber::registry().with(build_filter(settings.level));
    let spans = span_events(settings.include_spans);

    match settings.format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_span_events(spans))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_ansi(true).with_span_events(spans))
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(spans),
            )
            .try_init(),
    }
}

/// Initialize logging from a config section plus environment overrides
pub fn init_from_config(section: &LoggingSection) -> Result<(), TryInitError> {
    init_logging(&LogSettings::from_section(section).with_env_overrides())
}

/// Initialize logging from environment variables alone
pub fn init_default_logging() -> Result<(), TryInitError> {
    init_logging(&LogSettings::default().with_env_overrides())
}

/// Create a span around a single server command
#[macro_export]
macro_rules! command_span {
    ($($field:tt)*) => {
        tracing::info_span!("bot_command", $($field)*)
    };
}

pub use crate::command_span;
