//! Pure message routing and processing logic for MQTT events
//!
//! This module contains pure functions for classifying rumqttc events and
//! the forwarder that hands inbound publishes to the bot.

use crate::transport::InboundPublish;
use rumqttc::{ConnectReturnCode, ConnectionError, Event, Outgoing, Packet, SubscribeReasonCode};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => match &connack.code {
                    ConnectReturnCode::Success => EventRoute::ConnectionAcknowledged {
                        session_present: connack.session_present,
                    },
                    code => EventRoute::ConnectionRejected(Self::describe_return_code(code)),
                },
                Packet::Publish(publish) => EventRoute::MessageReceived(InboundPublish {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                }),
                Packet::Disconnect => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    failures: Self::count_subscription_failures(&suback.return_codes),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(Outgoing::Disconnect) => EventRoute::DisconnectSent,
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Human-readable reason for a refused connection (pure function)
    pub fn describe_return_code(code: &ConnectReturnCode) -> String {
        match code {
            ConnectReturnCode::Success => "accepted",
            ConnectReturnCode::RefusedProtocolVersion => "unsupported protocol version",
            ConnectReturnCode::BadClientId => "client identifier rejected",
            ConnectReturnCode::ServiceUnavailable => "broker unavailable",
            ConnectReturnCode::BadUserNamePassword => "bad bot ID or secret",
            ConnectReturnCode::NotAuthorized => "not authorized",
        }
        .to_string()
    }

    /// Reason recorded when the event loop fails (pure function)
    ///
    /// A v3.1.1 refusal surfaces as an error from `poll`, not as a ConnAck event.
    pub fn describe_connection_error(error: &ConnectionError) -> String {
        match error {
            ConnectionError::ConnectionRefused(code) => Self::describe_return_code(code),
            other => other.to_string(),
        }
    }

    /// Number of rejected filters in a SubAck (pure function)
    pub fn count_subscription_failures(return_codes: &[SubscribeReasonCode]) -> usize {
        return_codes
            .iter()
            .filter(|code| matches!(code, SubscribeReasonCode::Failure))
            .count()
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Session accepted - ready to publish/subscribe
    ConnectionAcknowledged { session_present: bool },
    /// Broker answered the CONNECT with a refusal
    ConnectionRejected(String),
    /// Message received on subscribed topic
    MessageReceived(InboundPublish),
    /// MQTT broker disconnected
    Disconnected,
    /// Our DISCONNECT has been written to the socket
    DisconnectSent,
    /// Subscription acknowledged; `failures` counts rejected filters
    SubscriptionConfirmed { packet_id: u16, failures: usize },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

/// Hands inbound publishes to the bot's dispatch channel
pub struct MessageForwarder {
    sender: Option<mpsc::Sender<InboundPublish>>,
}

impl MessageForwarder {
    pub fn new() -> Self {
        Self { sender: None }
    }

    pub fn set_sender(&mut self, sender: mpsc::Sender<InboundPublish>) {
        self.sender = Some(sender);
    }

    /// Drop the sender so the receiving side observes end of session
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    /// Forward a publish to the dispatch channel without waiting
    ///
    /// The event loop must keep polling while callbacks publish, so a full
    /// channel drops the message instead of applying backpressure.
    pub fn forward(&self, publish: InboundPublish) -> Result<(), String> {
        let Some(sender) = &self.sender else {
            warn!(topic = %publish.topic, "Received MQTT message but no inbound sender configured - message dropped");
            return Err("No inbound sender configured".to_string());
        };

        debug!(topic = %publish.topic, bytes = publish.payload.len(), "Forwarding inbound message");
        match sender.try_send(publish) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(dropped)) => {
                warn!(topic = %dropped.topic, "Inbound dispatch is behind - message dropped");
                Err("Inbound channel full".to_string())
            }
            Err(TrySendError::Closed(_)) => Err("Inbound receiver closed".to_string()),
        }
    }
}

impl Default for MessageForwarder {
    fn default() -> Self {
        Self::new()
    }
}
