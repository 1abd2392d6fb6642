//! Mock implementations for testing
//!
//! [`MockTransport`] records every call a bot makes and lets tests inject
//! inbound publishes or simulate a dropped connection without a broker.

use crate::transport::mqtt::{ConnectionState, MqttError};
use crate::transport::{Credentials, InboundPublish, Transport};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

pub type PublishedMessage = (String, Vec<u8>);

/// A transport call as seen by the mock, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Connect(String),
    Subscribe(String),
    Unsubscribe(String),
    Publish(String),
    Disconnect,
}

#[derive(Debug)]
struct MockState {
    connection: ConnectionState,
    connect_calls: Vec<Credentials>,
    disconnect_calls: usize,
    subscriptions: Vec<String>,
    unsubscriptions: Vec<String>,
    published: Vec<PublishedMessage>,
    events: Vec<MockEvent>,
    inbound: Option<mpsc::Sender<InboundPublish>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Idle,
            connect_calls: Vec::new(),
            disconnect_calls: 0,
            subscriptions: Vec::new(),
            unsubscriptions: Vec::new(),
            published: Vec::new(),
            events: Vec::new(),
            inbound: None,
        }
    }
}

/// Mock transport for testing
///
/// Clones share state, so a test can keep one clone while the bot owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    pub should_fail: bool,
    pub fail_publish: bool,
    pub fail_subscribe: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose connect calls are refused
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Transport that connects but fails every publish
    pub fn with_publish_failure() -> Self {
        Self {
            fail_publish: true,
            ..Default::default()
        }
    }

    /// Transport that connects but refuses every subscription
    pub fn with_subscribe_failure() -> Self {
        Self {
            fail_subscribe: true,
            ..Default::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn connect_calls(&self) -> Vec<Credentials> {
        self.state().connect_calls.clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.state().disconnect_calls
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state().subscriptions.clone()
    }

    pub fn unsubscriptions(&self) -> Vec<String> {
        self.state().unsubscriptions.clone()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state().published.clone()
    }

    /// Every connect, subscribe, unsubscribe, publish and disconnect, oldest first
    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    /// Payloads published on `topic`, oldest first
    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.state()
            .published
            .iter()
            .filter(|(published_topic, _)| published_topic == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn clear_history(&self) {
        let mut state = self.state();
        state.connect_calls.clear();
        state.disconnect_calls = 0;
        state.subscriptions.clear();
        state.unsubscriptions.clear();
        state.published.clear();
        state.events.clear();
    }

    /// Deliver a publish as if it arrived from the broker
    ///
    /// Returns false when no session is accepting inbound messages.
    pub async fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        let sender = self.state().inbound.clone();
        let Some(sender) = sender else {
            return false;
        };

        sender
            .send(InboundPublish {
                topic: topic.to_string(),
                payload: payload.into(),
            })
            .await
            .is_ok()
    }

    /// Simulate the broker dropping the session
    pub fn drop_connection(&self) {
        let mut state = self.state();
        state.connection = ConnectionState::Disconnected("connection lost".to_string());
        state.inbound = None;
    }

    fn require_connected(&self) -> Result<(), MqttError> {
        let state = self.state();
        if state.connection.is_ready() {
            Ok(())
        } else {
            Err(MqttError::NotConnected {
                state: state.connection.clone(),
            })
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MqttError;

    async fn connect(&self, credentials: &Credentials) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.connect_calls.push(credentials.clone());
        state
            .events
            .push(MockEvent::Connect(credentials.bot_id.clone()));

        if self.should_fail {
            state.connection = ConnectionState::Disconnected("refused".to_string());
            state.inbound = None;
            return Err(MqttError::ConnectionRefused(
                "Mock connection failure".to_string(),
            ));
        }
        if state.connection.is_ready() {
            return Err(MqttError::AlreadyConnected);
        }

        state.connection = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.disconnect_calls += 1;
        state.events.push(MockEvent::Disconnect);
        if !matches!(state.connection, ConnectionState::Idle) {
            state.connection = ConnectionState::Disconnected("client disconnect".to_string());
        }
        state.inbound = None;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error> {
        self.require_connected()?;
        let mut state = self.state();
        state.events.push(MockEvent::Subscribe(topic.to_string()));
        if self.fail_subscribe {
            return Err(MqttError::SubscriptionFailed {
                topic: topic.to_string(),
                source: "Mock subscription failure".into(),
            });
        }
        state.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), Self::Error> {
        self.require_connected()?;
        let mut state = self.state();
        state.events.push(MockEvent::Unsubscribe(topic.to_string()));
        state.unsubscriptions.push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        if self.fail_publish {
            return Err(MqttError::PublishFailed {
                topic: topic.to_string(),
                source: "Mock publish failure".into(),
            });
        }
        self.require_connected()?;
        let mut state = self.state();
        state.events.push(MockEvent::Publish(topic.to_string()));
        state.published.push((topic.to_string(), payload));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connection.is_ready()
    }

    fn connection_state(&self) -> ConnectionState {
        self.state().connection.clone()
    }

    fn set_inbound_sender(&self, sender: mpsc::Sender<InboundPublish>) {
        self.state().inbound = Some(sender);
    }
}
