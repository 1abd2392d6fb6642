//! Tests for logging configuration
//!
//! The pure settings resolution is tested here; installing the global
//! subscriber is checked once since it can only succeed a single time per process.

use toby::config::LoggingSection;
use toby::observability::{init_logging, LogFormat, LogSettings};
use tracing::Level;

#[test]
fn test_default_settings() {
    let settings = LogSettings::default();
    assert_eq!(settings.level, Level::INFO);
    assert_eq!(settings.format, LogFormat::Json);
    assert!(!settings.include_spans);
}

#[test]
fn test_section_values_are_case_insensitive() {
    let section = LoggingSection {
        level: "WARN".to_string(),
        format: "Compact".to_string(),
        spans: false,
    };
    let settings = LogSettings::from_section(&section);
    assert_eq!(settings.level, Level::WARN);
    assert_eq!(settings.format, LogFormat::Compact);
}

#[test]
fn test_unknown_values_fall_back() {
    let section = LoggingSection {
        level: "loud".to_string(),
        format: "yaml".to_string(),
        spans: true,
    };
    let settings = LogSettings::from_section(&section);
    assert_eq!(settings.level, Level::INFO);
    assert_eq!(settings.format, LogFormat::Json);
    assert!(settings.include_spans);
}

#[test]
fn test_partial_overrides() {
    let section = LoggingSection {
        level: "debug".to_string(),
        format: "pretty".to_string(),
        spans: true,
    };
    let settings = LogSettings::from_section(&section).with_overrides(|name| {
        (name == "TOBY_LOG_FORMAT").then(|| "json".to_string())
    });

    assert_eq!(settings.level, Level::DEBUG);
    assert_eq!(settings.format, LogFormat::Json);
    assert!(settings.include_spans);
}

#[test]
fn test_second_init_fails_without_panicking() {
    let settings = LogSettings {
        level: Level::DEBUG,
        format: LogFormat::Compact,
        include_spans: false,
    };
    let _ = init_logging(&settings);
    assert!(init_logging(&settings).is_err());

    let span = toby::command_span!(bot_id = "test-bot", command = "info");
    let _entered = span.enter();
    tracing::info!("inside command span");
}
