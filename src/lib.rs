//! Toby - client SDK for the Toby bot platform
//!
//! A bot is identified by an ID and secret. It connects to the platform's MQTT
//! broker, receives messages on `client/{bot_id}/#` and issues commands by
//! publishing JSON to `server/{bot_id}/{command}`.
//!
//! # Overview
//!
//! - [`protocol`] - Topics, the message envelope, command bodies and hashtag helpers
//! - [`transport`] - The [`transport::Transport`] seam and its MQTT implementation
//! - [`bot`] - The [`Bot`] façade with lifecycle callbacks and commands
//! - [`config`] - TOML configuration
//! - [`observability`] - Structured logging setup
//!
//! # Quick Start
//!
//! ```rust
//! use toby::protocol::{find_hashtags, Message, TopicBuilder};
//! use serde_json::json;
//!
//! let payload = json!({"message": "hello #world"}).as_object().cloned().unwrap();
//! let message = Message::new("", payload, vec!["world".to_string()], "my-ack");
//!
//! assert_eq!(TopicBuilder::inbound_subscription("my-bot"), "client/my-bot/#");
//! assert_eq!(find_hashtags("hello #world"), vec!["world"]);
//! assert!(message.encode().unwrap().contains("\"ack\":\"my-ack\""));
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use bot::{Bot, BotHandle};
pub use config::*;
pub use error::{BotError, BotResult};
pub use protocol::*;
