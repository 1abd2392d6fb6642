//! Error types for bot operations
//!
//! Transport failures are boxed so the façade stays independent of the
//! concrete transport in use.

use crate::config::ConfigError;
use crate::protocol::ValidationError;
use thiserror::Error;

/// Main error type for bot operations
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Invalid bot ID: {0}")]
    InvalidBotId(#[from] ValidationError),

    #[error("MQTT client not connected")]
    NotConnected,

    #[error("Bot already started")]
    AlreadyStarted,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    TransportError(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

impl BotError {
    /// Wrap a transport-specific error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransportError(Box::new(error))
    }
}

/// Result type for bot operations
pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BotError::NotConnected.to_string(),
            "MQTT client not connected"
        );
        assert_eq!(
            BotError::from(ValidationError::EmptyBotId).to_string(),
            "Invalid bot ID: Bot ID cannot be empty"
        );
        assert_eq!(
            BotError::from(ConfigError::MissingSecret("b".into())).to_string(),
            "Configuration error: No secret configured for bot 'b'"
        );
    }

    #[test]
    fn test_transport_wrapping_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = BotError::transport(io);

        assert!(matches!(error, BotError::TransportError(_)));
        assert_eq!(error.to_string(), "Transport error: refused");
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_serialization_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: BotError = json_error.into();
        assert!(matches!(error, BotError::Serialization(_)));
    }
}
