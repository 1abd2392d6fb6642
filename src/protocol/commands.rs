//! Request bodies for commands published under `server/{bot_id}/`
//!
//! Field names match the platform's wire format exactly. Fields are declared
//! in lexical order so the encoded objects are stable.

use serde::{Deserialize, Serialize};

/// Body shared by `hooks-off` and `info`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AckRequest {
    #[serde(rename = "ackTag")]
    pub ack_tag: String,
}

/// Body for `follow` and `unfollow`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagRequest {
    #[serde(rename = "ackTag")]
    pub ack_tag: String,
    /// A single tag, despite the plural field name
    pub tags: String,
}

/// Body for `hooks-on`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HooksOnRequest {
    #[serde(rename = "ackTag")]
    pub ack_tag: String,
    #[serde(rename = "hookSecret")]
    pub hook_secret: String,
}

/// Body for `create-bot`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateBotRequest {
    #[serde(rename = "ackTag")]
    pub ack_tag: String,
    pub id: String,
    pub secret: String,
}

/// Body for `create-socket`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSocketRequest {
    #[serde(rename = "ackTag")]
    pub ack_tag: String,
    pub persist: bool,
}

/// Body for `remove-bot` and `remove-socket`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoveRequest {
    #[serde(rename = "ackTag")]
    pub ack_tag: String,
    #[serde(rename = "botId")]
    pub bot_id: String,
}
