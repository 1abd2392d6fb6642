//! Message envelope exchanged between bots and the Toby platform
//!
//! Inbound traffic arrives in one of two shapes: a regular [`Message`] or a
//! [`CredentialsResponse`] answering a `create-bot` request. [`decode_inbound`]
//! accepts either and always yields a `Message`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON object carried in a message payload
pub type Payload = Map<String, Value>;

/// Message envelope
///
/// # Examples
/// ```
/// use toby::protocol::Message;
/// use serde_json::json;
///
/// let payload = json!({"message": "hello"}).as_object().cloned().unwrap();
/// let message = Message::new("", payload, vec!["greetings".to_string()], "req-1");
///
/// let json = message.encode().unwrap();
/// assert_eq!(json, r#"{"payload":{"message":"hello"},"tags":["greetings"],"ack":"req-1"}"#);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Message {
    /// Sending bot, stamped by the platform on delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Arbitrary JSON object
    pub payload: Payload,
    /// Tags the message is published under
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ack tag; empty when no acknowledgment is requested
    #[serde(default)]
    pub ack: String,
    /// Bot ID, set on credential exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Bot secret, set on credential exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sk: Option<String>,
}

/// Outbound view of a message. The platform stamps `from` itself.
#[derive(Serialize)]
struct OutboundMessage<'a> {
    payload: &'a Payload,
    tags: &'a [String],
    ack: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sk: Option<&'a str>,
}

impl Message {
    /// Build a message. An empty `from` is treated as absent.
    pub fn new<F, A>(from: F, payload: Payload, tags: Vec<String>, ack: A) -> Self
    where
        F: Into<String>,
        A: Into<String>,
    {
        let from = from.into();
        Self {
            from: (!from.is_empty()).then_some(from),
            payload,
            tags,
            ack: ack.into(),
            id: None,
            sk: None,
        }
    }

    /// Whether the sender asked for an acknowledgment
    pub fn wants_ack(&self) -> bool {
        !self.ack.is_empty()
    }

    /// Serialize for publishing on `server/{bot_id}/send`
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&OutboundMessage {
            payload: &self.payload,
            tags: &self.tags,
            ack: &self.ack,
            id: self.id.as_deref(),
            sk: self.sk.as_deref(),
        })
    }

    /// Strict decode of the regular message shape. `payload` must be present.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Credentials issued by the platform in response to `create-bot`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialsResponse {
    pub id: String,
    pub sk: String,
    #[serde(default)]
    pub ack: String,
}

impl From<CredentialsResponse> for Message {
    fn from(credentials: CredentialsResponse) -> Self {
        Message {
            from: None,
            payload: Payload::new(),
            tags: Vec::new(),
            ack: credentials.ack,
            id: Some(credentials.id),
            sk: Some(credentials.sk),
        }
    }
}

/// Inbound payload that matched neither known shape
#[derive(Debug, Error)]
#[error("Unrecognized inbound payload: {message_error}")]
pub struct DecodeError {
    /// Failure decoding as a regular message
    #[source]
    pub message_error: serde_json::Error,
    /// Failure decoding as a credentials response
    pub credentials_error: serde_json::Error,
}

/// Decode an inbound payload as a message, falling back to the credentials shape
pub fn decode_inbound(bytes: &[u8]) -> Result<Message, DecodeError> {
    let message_error = match Message::decode(bytes) {
        Ok(message) => return Ok(message),
        Err(e) => e,
    };

    serde_json::from_slice::<CredentialsResponse>(bytes)
        .map(Message::from)
        .map_err(|credentials_error| DecodeError {
            message_error,
            credentials_error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_new_treats_empty_from_as_absent() {
        let message = Message::new("", Payload::new(), vec![], "");
        assert_eq!(message.from, None);

        let message = Message::new("alice", Payload::new(), vec![], "");
        assert_eq!(message.from.as_deref(), Some("alice"));
    }

    #[test]
    fn test_encode_omits_from() {
        let message = Message::new(
            "alice",
            payload(json!({"text": "hi"})),
            vec!["a".into(), "b".into()],
            "ack-1",
        );

        let encoded: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({"payload": {"text": "hi"}, "tags": ["a", "b"], "ack": "ack-1"})
        );
    }

    #[test]
    fn test_encode_empty_message_emits_empty_collections() {
        let encoded = Message::default().encode().unwrap();
        assert_eq!(encoded, r#"{"payload":{},"tags":[],"ack":""}"#);
    }

    #[test]
    fn test_encode_keeps_credentials() {
        let mut message = Message::default();
        message.id = Some("new-bot".into());
        message.sk = Some("secret".into());

        let encoded: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert_eq!(encoded["id"], "new-bot");
        assert_eq!(encoded["sk"], "secret");
    }

    #[test]
    fn test_decode_message_with_defaults() {
        let message = Message::decode(br#"{"from":"bob","payload":{"n":1}}"#).unwrap();
        assert_eq!(message.from.as_deref(), Some("bob"));
        assert_eq!(message.payload["n"], 1);
        assert!(message.tags.is_empty());
        assert!(!message.wants_ack());
    }

    #[test]
    fn test_decode_requires_payload() {
        assert!(Message::decode(br#"{"tags":["x"],"ack":"y"}"#).is_err());
        assert!(Message::decode(br#"{"payload":"not an object"}"#).is_err());
        assert!(Message::decode(b"not json").is_err());
    }

    #[test]
    fn test_decode_inbound_prefers_message() {
        let message =
            decode_inbound(br#"{"from":"bob","payload":{},"tags":["t"],"ack":"a","id":"x"}"#)
                .unwrap();
        assert_eq!(message.tags, vec!["t"]);
        assert_eq!(message.ack, "a");
        assert_eq!(message.id.as_deref(), Some("x"));
    }

    #[test]
    fn test_decode_inbound_falls_back_to_credentials() {
        let message = decode_inbound(br#"{"id":"new-bot","sk":"s3cr3t","ack":"create-1"}"#)
            .unwrap();
        assert_eq!(message.id.as_deref(), Some("new-bot"));
        assert_eq!(message.sk.as_deref(), Some("s3cr3t"));
        assert_eq!(message.ack, "create-1");
        assert!(message.payload.is_empty());
        assert!(message.tags.is_empty());
        assert_eq!(message.from, None);
    }

    #[test]
    fn test_decode_inbound_rejects_unknown_shapes() {
        assert!(decode_inbound(b"garbage").is_err());
        assert!(decode_inbound(br#"{"id":"only-id"}"#).is_err());

        let err = decode_inbound(br#"{"hello":"world"}"#).unwrap_err();
        assert!(err.to_string().contains("Unrecognized inbound payload"));
    }
}
