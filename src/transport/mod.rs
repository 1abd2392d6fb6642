//! Transport layer between a bot and the broker
//!
//! The [`Transport`] trait is the seam the bot façade is written against. The
//! MQTT implementation lives in [`mqtt`]; [`crate::testing::MockTransport`]
//! stands in for it in tests.

use std::fmt;
use tokio::sync::mpsc;

pub mod mqtt;

pub use mqtt::ConnectionState;

/// Identity presented to the broker
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bot_id: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(bot_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_id", &self.bot_id)
            .field("secret", &"***")
            .finish()
    }
}

/// Raw publish received on a subscribed topic
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPublish {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Transport abstraction for bot communication
///
/// All operations take `&self` so a transport can be shared between the bot
/// and the handles given to user callbacks.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a session and wait until the broker accepts it
    async fn connect(&self, credentials: &Credentials) -> Result<(), Self::Error>;

    /// Close the session. A no-op when never connected.
    async fn disconnect(&self) -> Result<(), Self::Error>;

    /// Subscribe to a topic filter at QoS 0
    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error>;

    async fn unsubscribe(&self, topic: &str) -> Result<(), Self::Error>;

    /// Fire-and-forget publish at QoS 0
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error>;

    fn is_connected(&self) -> bool;

    fn connection_state(&self) -> ConnectionState;

    /// Route inbound publishes to `sender`. The sender is dropped when the
    /// session ends, closing the channel.
    fn set_inbound_sender(&self, sender: mpsc::Sender<InboundPublish>);
}

/// Type alias for MQTT transport
pub type MqttTransport = mqtt::MqttClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = Credentials::new("bot-1", "super-secret");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("bot-1"));
        assert!(!debug.contains("super-secret"));
    }
}
