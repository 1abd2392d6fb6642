//! Pure connection state management for MQTT client
//!
//! Connection state, transport errors and translation of configuration into
//! rumqttc options.

use crate::config::MqttSection;
use crate::transport::Credentials;
use rumqttc::{MqttOptions, Transport as RumqttcTransport};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Connection state for MQTT client
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Never connected
    Idle,
    /// Waiting for the broker's ConnAck
    Connecting,
    /// Session accepted; publishing and subscribing allowed
    Connected,
    /// Session ended, with reason
    Disconnected(String),
}

impl ConnectionState {
    /// Whether publish/subscribe requests may be issued
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),
    #[error("ConnAck timeout after {0:?}")]
    ConnectTimeout(Duration),
    #[error("Publishing to {topic} failed")]
    PublishFailed {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Subscription to {topic} failed")]
    SubscriptionFailed {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Client ID cannot be empty")]
    EmptyClientId,
}

/// Resolved broker endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Parse a broker URL into host, port and TLS flag
pub fn parse_broker_url(broker_url: &str) -> Result<BrokerEndpoint, MqttError> {
    let url = Url::parse(broker_url)
        .map_err(|_| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;

    let tls = match url.scheme() {
        "mqtt" | "tcp" => false,
        "mqtts" | "ssl" | "tls" => true,
        _ => return Err(MqttError::InvalidBrokerUrl(broker_url.to_string())),
    };

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| MqttError::InvalidBrokerUrl(broker_url.to_string()))?;
    let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

    Ok(BrokerEndpoint {
        host: host.to_string(),
        port,
        tls,
    })
}

/// Pure function to configure MQTT options from config and bot credentials
///
/// The bot ID doubles as client ID and username, and the session is
/// persistent (`clean_session = false`) so the broker keeps subscriptions
/// across reconnects by the same bot.
pub fn configure_mqtt_options(
    config: &MqttSection,
    credentials: &Credentials,
) -> Result<MqttOptions, MqttError> {
    if credentials.bot_id.is_empty() {
        return Err(MqttError::EmptyClientId);
    }
    let endpoint = parse_broker_url(&config.broker_url)?;

    let mut mqtt_options = MqttOptions::new(&credentials.bot_id, endpoint.host, endpoint.port);

    if endpoint.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    mqtt_options.set_credentials(&credentials.bot_id, &credentials.secret);
    mqtt_options.set_clean_session(false);
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));

    Ok(mqtt_options)
}
