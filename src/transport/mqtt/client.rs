//! Impure I/O operations for MQTT client
//!
//! This module owns the rumqttc client and event loop task. A session is a
//! single connect attempt: the event loop stops on the first error or broker
//! disconnect and the inbound channel is closed, leaving any reconnect
//! decision to the caller.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError};
use super::message_handler::{EventRoute, MessageForwarder, MessageHandler};
use crate::config::MqttSection;
use crate::transport::{Credentials, InboundPublish, Transport};
use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long `disconnect` waits for the event loop task to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// MQTT transport client for a Toby bot
pub struct MqttClient {
    config: MqttSection,
    client: Mutex<Option<AsyncClient>>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    event_loop_handle: Mutex<Option<JoinHandle<()>>>,
    message_forwarder: Arc<Mutex<MessageForwarder>>,
}

impl MqttClient {
    /// Create a client for the configured broker. Fails only on an invalid broker URL.
    pub fn new(config: MqttSection) -> Result<Self, MqttError> {
        super::connection::parse_broker_url(&config.broker_url)?;

        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        Ok(MqttClient {
            config,
            client: Mutex::new(None),
            state_tx,
            state_rx,
            shutdown_tx: Mutex::new(None),
            event_loop_handle: Mutex::new(None),
            message_forwarder: Arc::new(Mutex::new(MessageForwarder::new())),
        })
    }

    pub fn config(&self) -> &MqttSection {
        &self.config
    }

    /// Wait for connection confirmation (ConnAck) with timeout
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let confirmation = tokio::time::timeout(timeout, async {
            loop {
                match &*state_rx.borrow_and_update() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected(reason) => {
                        return Err(MqttError::ConnectionRefused(reason.clone()));
                    }
                    ConnectionState::Idle | ConnectionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionRefused(
                        "State channel closed".to_string(),
                    ));
                }
            }
        })
        .await;

        confirmation.unwrap_or(Err(MqttError::ConnectTimeout(timeout)))
    }

    /// Connect to the broker and wait for the session to be accepted
    pub async fn connect(&self, credentials: &Credentials) -> Result<(), MqttError> {
        if self.is_connected() {
            return Err(MqttError::AlreadyConnected);
        }

        let mqtt_options = configure_mqtt_options(&self.config, credentials)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, self.config.channel_capacity);

        let _ = self.state_tx.send(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            bot_id = %credentials.bot_id,
            broker = %self.config.broker_url,
            "Connecting to MQTT broker"
        );

        let handle = tokio::spawn(Self::run_event_loop(
            event_loop,
            self.state_tx.clone(),
            shutdown_rx,
            self.message_forwarder.clone(),
            credentials.bot_id.clone(),
        ));

        *self.client.lock().await = Some(client);
        *self.shutdown_tx.lock().await = Some(shutdown_tx);
        *self.event_loop_handle.lock().await = Some(handle);

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        if let Err(e) =
            Self::wait_for_connection_confirmation(self.state_rx.clone(), timeout).await
        {
            error!(bot_id = %credentials.bot_id, error = %e, "MQTT connection failed");
            self.stop_event_loop().await;
            let _ = self.state_tx.send(ConnectionState::Disconnected(e.to_string()));
            return Err(e);
        }

        Ok(())
    }

    /// Event loop task: polls until shutdown, error or broker disconnect
    async fn run_event_loop(
        mut event_loop: EventLoop,
        state_tx: watch::Sender<ConnectionState>,
        mut shutdown_rx: watch::Receiver<bool>,
        message_forwarder: Arc<Mutex<MessageForwarder>>,
        bot_id: String,
    ) {
        debug!(bot_id = %bot_id, "Starting MQTT event loop");

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Shutdown signal received, stopping event loop");
                        break;
                    }
                }
                event = event_loop.poll() => match event {
                    Ok(event) => {
                        let route = MessageHandler::route_mqtt_event(&event);
                        if !Self::process_event_route(route, &state_tx, &message_forwarder).await {
                            break;
                        }
                    }
                    Err(e) => {
                        let reason = MessageHandler::describe_connection_error(&e);
                        error!(bot_id = %bot_id, error = %reason, "MQTT event loop error");
                        let _ = state_tx.send(ConnectionState::Disconnected(reason));
                        break;
                    }
                }
            }
        }

        // Closing the forwarder ends the bot's dispatch loop
        message_forwarder.lock().await.close();
        info!(bot_id = %bot_id, "MQTT event loop stopped");
    }

    /// Process routed MQTT event. Returns true to keep polling.
    async fn process_event_route(
        route: EventRoute,
        state_tx: &watch::Sender<ConnectionState>,
        message_forwarder: &Arc<Mutex<MessageForwarder>>,
    ) -> bool {
        match route {
            EventRoute::ConnectionAcknowledged { session_present } => {
                info!(session_present, "MQTT client connected");
                let _ = state_tx.send(ConnectionState::Connected);
                true
            }
            EventRoute::ConnectionRejected(reason) => {
                let _ = state_tx.send(ConnectionState::Disconnected(reason));
                false
            }
            EventRoute::MessageReceived(publish) => {
                if let Err(e) = message_forwarder.lock().await.forward(publish) {
                    debug!("Inbound message not delivered: {}", e);
                }
                true
            }
            EventRoute::Disconnected => {
                warn!("MQTT broker closed the session");
                let _ = state_tx.send(ConnectionState::Disconnected(
                    "Broker disconnected".to_string(),
                ));
                false
            }
            EventRoute::DisconnectSent => {
                debug!("DISCONNECT flushed to broker");
                let _ = state_tx.send(ConnectionState::Disconnected(
                    "Client disconnected".to_string(),
                ));
                false
            }
            EventRoute::SubscriptionConfirmed {
                packet_id,
                failures,
            } => {
                if failures > 0 {
                    warn!(packet_id, failures, "Broker rejected subscription");
                } else {
                    debug!(target: "mqtt_transport", packet_id, "Subscription confirmed");
                }
                true
            }
            EventRoute::InfrastructureEvent(event) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event);
                true
            }
            EventRoute::OutgoingEvent => true,
        }
    }

    /// Signal the event loop task and wait for it, aborting after the grace period
    async fn stop_event_loop(&self) {
        if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
            let _ = shutdown_tx.send(true);
        }

        if let Some(mut handle) = self.event_loop_handle.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => debug!("Event loop task shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => warn!("Event loop task ended with error: {}", e),
                Ok(Err(_)) => {}
                Err(_) => {
                    warn!("Event loop task didn't shut down gracefully, forcing abort");
                    handle.abort();
                }
            }
        }

        self.client.lock().await.take();
    }

    /// Let the event loop drain queued requests up to and including DISCONNECT
    async fn wait_for_disconnect_flush(&self) {
        let mut guard = self.event_loop_handle.lock().await;
        let finished = match guard.as_mut() {
            Some(handle) => tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_ok(),
            None => return,
        };

        if finished {
            guard.take();
            debug!("Event loop finished after DISCONNECT");
        } else {
            warn!("DISCONNECT not flushed within {:?}", SHUTDOWN_GRACE);
        }
    }

    /// Disconnect from the broker. A no-op for a client that never connected.
    ///
    /// Requests queued before this call, such as an unsubscribe, reach the
    /// broker ahead of the DISCONNECT packet.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        let client = self.client.lock().await.clone();
        let Some(client) = client else {
            debug!("Disconnect requested without an active session");
            return Ok(());
        };

        if self.is_connected() {
            match client.disconnect().await {
                Ok(()) => self.wait_for_disconnect_flush().await,
                Err(e) => warn!("Failed to send DISCONNECT: {}", e),
            }
        }

        self.stop_event_loop().await;
        let _ = self.state_tx.send(ConnectionState::Disconnected(
            "Client disconnected".to_string(),
        ));

        info!("MQTT client disconnected");
        Ok(())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_ready()
    }

    /// Client handle, provided the session is usable
    async fn ready_client(&self) -> Result<AsyncClient, MqttError> {
        let state = self.connection_state();
        if !state.is_ready() {
            return Err(MqttError::NotConnected { state });
        }

        self.client
            .lock()
            .await
            .clone()
            .ok_or(MqttError::NotConnected { state })
    }

    pub async fn subscribe(&self, topic: &str) -> Result<(), MqttError> {
        let client = self.ready_client().await?;

        info!("Subscribing to topic: {}", topic);
        client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| MqttError::SubscriptionFailed {
                topic: topic.to_string(),
                source: Box::new(e),
            })
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<(), MqttError> {
        let client = self.ready_client().await?;

        info!("Unsubscribing from topic: {}", topic);
        client
            .unsubscribe(topic)
            .await
            .map_err(|e| MqttError::SubscriptionFailed {
                topic: topic.to_string(),
                source: Box::new(e),
            })
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        let client = self.ready_client().await?;

        let bytes = payload.len();
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| MqttError::PublishFailed {
                topic: topic.to_string(),
                source: Box::new(e),
            })?;

        debug!(topic, bytes, "Published message");
        Ok(())
    }
}

/// Implementation of Transport trait for MqttClient
#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&self, credentials: &Credentials) -> Result<(), Self::Error> {
        MqttClient::connect(self, credentials).await
    }

    async fn disconnect(&self) -> Result<(), Self::Error> {
        MqttClient::disconnect(self).await
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Self::Error> {
        MqttClient::subscribe(self, topic).await
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), Self::Error> {
        MqttClient::unsubscribe(self, topic).await
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        MqttClient::publish(self, topic, payload).await
    }

    fn is_connected(&self) -> bool {
        MqttClient::is_connected(self)
    }

    fn connection_state(&self) -> ConnectionState {
        MqttClient::connection_state(self)
    }

    fn set_inbound_sender(&self, sender: mpsc::Sender<InboundPublish>) {
        // Registration happens before connect, so the lock is uncontended
        match self.message_forwarder.try_lock() {
            Ok(mut forwarder) => forwarder.set_sender(sender),
            Err(_) => {
                let message_forwarder = self.message_forwarder.clone();
                tokio::spawn(async move {
                    message_forwarder.lock().await.set_sender(sender);
                });
            }
        }
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.get_mut().take() {
            let _ = shutdown_tx.send(true);
        }

        // No async in Drop; callers wanting a clean DISCONNECT use disconnect()
        if let Some(handle) = self.event_loop_handle.get_mut().take() {
            handle.abort();
        }
    }
}
