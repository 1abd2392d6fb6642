//! Configuration for a Toby bot
//!
//! Loaded from TOML. Only `bot.id` is required; the broker defaults to the
//! hosted platform and logging defaults to JSON at INFO.
//!
//! ```toml
//! [bot]
//! id = "my-bot"
//! secret_env = "TOBY_SECRET"
//!
//! [mqtt]
//! broker_url = "tcp://toby.cloud:444"
//! keep_alive_secs = 30
//!
//! [logging]
//! level = "debug"
//! format = "compact"
//! ```

use crate::protocol::validate_bot_id;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Hosted Toby broker
pub const DEFAULT_BROKER_URL: &str = "tcp://toby.cloud:444";

/// Main bot configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    pub bot: BotSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Bot identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotSection {
    /// Bot identifier, used as MQTT client ID and username
    pub id: String,
    /// Inline secret. Prefer `secret_env` outside of local testing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Environment variable containing the secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL; `tcp://`/`mqtt://` for plain TCP, `ssl://`/`mqtts://` for TLS
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// How long `connect` waits for the broker's ConnAck
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Request channel capacity of the MQTT client
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_broker_url() -> String {
    DEFAULT_BROKER_URL.to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    10
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Logging settings; see [`crate::observability::logging`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub spans: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            spans: false,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid bot ID format: {0}")]
    InvalidBotId(String),
    #[error("No secret configured for bot '{0}'")]
    MissingSecret(String),
}

impl BotConfig {
    /// Configuration for `bot_id` with every other setting at its default
    pub fn new(bot_id: impl Into<String>) -> Self {
        Self {
            bot: BotSection {
                id: bot_id.into(),
                secret: None,
                secret_env: None,
            },
            mqtt: MqttSection::default(),
            logging: LoggingSection::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BotConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bot_id(&self.bot.id)
            .map_err(|e| ConfigError::InvalidBotId(format!("'{}': {e}", self.bot.id)))
    }

    /// Resolve the bot secret. `secret_env` wins over an inline `secret`.
    pub fn resolve_secret(&self) -> Result<String, ConfigError> {
        if let Some(env_name) = &self.bot.secret_env {
            return std::env::var(env_name)
                .map_err(|_| ConfigError::EnvVarNotFound(env_name.clone()));
        }

        self.bot
            .secret
            .clone()
            .ok_or_else(|| ConfigError::MissingSecret(self.bot.id.clone()))
    }
}
