//! MQTT transport for Toby bots
//!
//! Pure functions are kept apart from I/O so they can be tested without a broker:
//!
//! - [`connection`] - Connection state, errors and option construction
//! - [`message_handler`] - Event classification and inbound forwarding
//! - [`client`] - The rumqttc client and its event loop task
//!
//! # Usage
//!
//! ```rust,no_run
//! use toby::config::MqttSection;
//! use toby::transport::Credentials;
//! use toby::transport::mqtt::MqttClient;
//!
//! # tokio_test::block_on(async {
//! let client = MqttClient::new(MqttSection::default())?;
//! client.connect(&Credentials::new("my-bot", "my-secret")).await?;
//! client.subscribe("client/my-bot/#").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttClient;
pub use connection::{
    configure_mqtt_options, parse_broker_url, BrokerEndpoint, ConnectionState, MqttError,
};
pub use message_handler::{EventRoute, MessageForwarder, MessageHandler};
