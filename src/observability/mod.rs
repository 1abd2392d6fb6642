//! Observability for Toby bots
//!
//! Structured logging via `tracing`, configured from the `[logging]` section
//! and `TOBY_LOG_*` environment variables.

pub mod logging;

pub use logging::{
    init_default_logging, init_from_config, init_logging, parse_level, LogFormat, LogSettings,
};

pub use logging::command_span;
