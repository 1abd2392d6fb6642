//! Bot façade
//!
//! A [`Bot`] owns one transport session. Starting it connects with the bot ID
//! and secret, runs the on-connect callback, then subscribes to
//! `client/{bot_id}/#`. Inbound publishes are decoded and handed to the
//! on-message callback with the `client/{bot_id}/` prefix stripped from the
//! topic. Commands are issued through [`BotHandle`], which callbacks receive.
//!
//! ```rust,no_run
//! use toby::bot::Bot;
//! use toby::transport::mqtt::MqttClient;
//! use toby::config::MqttSection;
//!
//! # tokio_test::block_on(async {
//! let transport = MqttClient::new(MqttSection::default())?;
//! let mut bot = Bot::new(transport)
//!     .with_bot_id("my-bot")
//!     .with_secret("my-secret")
//!     .on_connect(|bot| async move {
//!         let _ = bot.follow("news", "").await;
//!     })
//!     .on_message(|_bot, topic, message| async move {
//!         println!("{topic}: {:?}", message.payload);
//!     });
//!
//! bot.start().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

mod handle;

pub use handle::BotHandle;

use crate::config::BotConfig;
use crate::error::{BotError, BotResult};
use crate::protocol::{decode_inbound, validate_bot_id, Message, TopicBuilder};
use crate::transport::{Credentials, InboundPublish, Transport};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Boxed future returned by callbacks
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub type OnConnectHandler<T> = Arc<dyn Fn(BotHandle<T>) -> HandlerFuture + Send + Sync>;
pub type OnDisconnectHandler = Arc<dyn Fn() -> HandlerFuture + Send + Sync>;
pub type OnMessageHandler<T> =
    Arc<dyn Fn(BotHandle<T>, String, Message) -> HandlerFuture + Send + Sync>;

const INBOUND_CHANNEL_CAPACITY: usize = 64;
const DISPATCH_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A bot on the Toby platform
pub struct Bot<T: Transport> {
    bot_id: String,
    secret: String,
    transport: Arc<T>,
    on_connect: Option<OnConnectHandler<T>>,
    on_disconnect: Option<OnDisconnectHandler>,
    on_message: Option<OnMessageHandler<T>>,
    dispatch_handle: Option<JoinHandle<()>>,
    disconnect_notified: Arc<AtomicBool>,
}

impl<T: Transport> Bot<T> {
    /// Create a bot with no identity or callbacks yet
    pub fn new(transport: T) -> Self {
        Self {
            bot_id: String::new(),
            secret: String::new(),
            transport: Arc::new(transport),
            on_connect: None,
            on_disconnect: None,
            on_message: None,
            dispatch_handle: None,
            disconnect_notified: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a bot whose identity comes from configuration
    pub fn from_config(config: &BotConfig, transport: T) -> BotResult<Self> {
        config.validate()?;
        let secret = config.resolve_secret()?;

        Ok(Self::new(transport)
            .with_bot_id(config.bot.id.clone())
            .with_secret(secret))
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = bot_id.into();
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// Called once the session is accepted, before the inbound subscription
    pub fn on_connect<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(BotHandle<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connect = Some(Arc::new(move |bot| Box::pin(handler(bot))));
        self
    }

    /// Called at most once per session, on `stop()` or when the connection drops
    pub fn on_disconnect<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_disconnect = Some(Arc::new(move || Box::pin(handler())));
        self
    }

    /// Called for every decoded inbound message, with the namespace-stripped topic
    pub fn on_message<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(BotHandle<T>, String, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_message = Some(Arc::new(move |bot, topic, message| {
            Box::pin(handler(bot, topic, message))
        }));
        self
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn handle(&self) -> BotHandle<T> {
        BotHandle::new(&self.bot_id, self.transport.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Whether a session started by this bot is still being dispatched
    pub fn is_running(&self) -> bool {
        self.dispatch_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Connect, run the on-connect callback and subscribe to `client/{bot_id}/#`
    ///
    /// If the subscription fails the session is disconnected again and
    /// on-disconnect fires, leaving the bot ready for another `start`.
    pub async fn start(&mut self) -> BotResult<()> {
        validate_bot_id(&self.bot_id)?;
        if self.is_running() {
            return Err(BotError::AlreadyStarted);
        }

        info!(bot_id = %self.bot_id, "Starting bot");

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        self.transport.set_inbound_sender(inbound_tx);

        let credentials = Credentials::new(&self.bot_id, &self.secret);
        self.transport
            .connect(&credentials)
            .await
            .map_err(BotError::transport)?;

        info!(bot_id = %self.bot_id, "Connected to broker");
        self.disconnect_notified.store(false, Ordering::SeqCst);

        self.dispatch_handle = Some(tokio::spawn(dispatch_inbound(
            inbound_rx,
            self.handle(),
            self.on_message.clone(),
            self.on_disconnect.clone(),
            self.disconnect_notified.clone(),
        )));

        if let Some(on_connect) = &self.on_connect {
            on_connect(self.handle()).await;
        }

        let topic = TopicBuilder::inbound_subscription(&self.bot_id);
        if let Err(e) = self.transport.subscribe(&topic).await {
            error!(topic = %topic, error = %e, "Subscription failed, closing session");
            if let Err(teardown_error) = self.teardown().await {
                warn!(error = %teardown_error, "Disconnect after failed subscription also failed");
            }
            return Err(BotError::transport(e));
        }

        info!(topic = %topic, "Subscribed to bot topics");
        Ok(())
    }

    /// Unsubscribe, disconnect and notify the on-disconnect callback
    ///
    /// A no-op for a bot that was never started.
    pub async fn stop(&mut self) -> BotResult<()> {
        if self.dispatch_handle.is_none() {
            debug!(bot_id = %self.bot_id, "Stop requested but bot was never started");
            return Ok(());
        }

        info!(bot_id = %self.bot_id, "Stopping bot");

        if self.transport.is_connected() {
            let topic = TopicBuilder::inbound_subscription(&self.bot_id);
            if let Err(e) = self.transport.unsubscribe(&topic).await {
                warn!(topic = %topic, error = %e, "Failed to unsubscribe during stop");
            }
        }

        let result = self.teardown().await;
        info!(bot_id = %self.bot_id, "Bot stopped");
        result
    }

    /// Disconnect, notify on-disconnect and wait for the dispatch task to drain
    async fn teardown(&mut self) -> BotResult<()> {
        let result = self
            .transport
            .disconnect()
            .await
            .map_err(BotError::transport);

        notify_disconnect(&self.disconnect_notified, self.on_disconnect.as_ref()).await;

        if let Some(mut dispatch) = self.dispatch_handle.take() {
            if tokio::time::timeout(DISPATCH_SHUTDOWN_GRACE, &mut dispatch)
                .await
                .is_err()
            {
                warn!("Inbound dispatch did not finish in time, aborting");
                dispatch.abort();
            }
        }

        result
    }

    pub async fn send(&self, message: &Message) -> BotResult<()> {
        self.handle().send(message).await
    }

    pub async fn follow(&self, tag: &str, ack_tag: &str) -> BotResult<()> {
        self.handle().follow(tag, ack_tag).await
    }

    pub async fn unfollow(&self, tag: &str, ack_tag: &str) -> BotResult<()> {
        self.handle().unfollow(tag, ack_tag).await
    }

    pub async fn hooks_on(&self, hook_secret: &str, ack_tag: &str) -> BotResult<()> {
        self.handle().hooks_on(hook_secret, ack_tag).await
    }

    pub async fn hooks_off(&self, ack_tag: &str) -> BotResult<()> {
        self.handle().hooks_off(ack_tag).await
    }

    pub async fn info(&self, ack_tag: &str) -> BotResult<()> {
        self.handle().info(ack_tag).await
    }

    pub async fn create_bot(&self, id: &str, secret: &str, ack_tag: &str) -> BotResult<()> {
        self.handle().create_bot(id, secret, ack_tag).await
    }

    pub async fn create_socket(&self, persist: bool, ack_tag: &str) -> BotResult<()> {
        self.handle().create_socket(persist, ack_tag).await
    }

    pub async fn remove_bot(&self, target_id: &str, ack_tag: &str) -> BotResult<()> {
        self.handle().remove_bot(target_id, ack_tag).await
    }

    pub async fn remove_socket(&self, target_id: &str, ack_tag: &str) -> BotResult<()> {
        self.handle().remove_socket(target_id, ack_tag).await
    }
}

impl<T: Transport> Drop for Bot<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatch_handle.take() {
            handle.abort();
        }
    }
}

/// Decode inbound publishes and hand them to the on-message callback until
/// the transport closes the channel
async fn dispatch_inbound<T: Transport>(
    mut inbound: mpsc::Receiver<InboundPublish>,
    bot: BotHandle<T>,
    on_message: Option<OnMessageHandler<T>>,
    on_disconnect: Option<OnDisconnectHandler>,
    disconnect_notified: Arc<AtomicBool>,
) {
    while let Some(publish) = inbound.recv().await {
        let topic = TopicBuilder::strip_namespace(&publish.topic);

        match decode_inbound(&publish.payload) {
            Ok(message) => {
                debug!(topic = %topic, from = ?message.from, "Message received");
                if let Some(handler) = &on_message {
                    handler(bot.clone(), topic, message).await;
                }
            }
            Err(e) => {
                warn!(topic = %publish.topic, error = %e, "Dropping undecodable message");
            }
        }
    }

    debug!(bot_id = %bot.bot_id(), "Inbound channel closed");
    notify_disconnect(&disconnect_notified, on_disconnect.as_ref()).await;
}

async fn notify_disconnect(notified: &AtomicBool, handler: Option<&OnDisconnectHandler>) {
    if notified.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(handler) = handler {
        handler().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use std::sync::atomic::AtomicUsize;

    fn test_bot() -> (Bot<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        let bot = Bot::new(transport.clone())
            .with_bot_id("test-bot")
            .with_secret("secret");
        (bot, transport)
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_bot_id() {
        let mut bot = Bot::new(MockTransport::new()).with_bot_id("bad/id");
        assert!(matches!(bot.start().await, Err(BotError::InvalidBotId(_))));

        let mut bot = Bot::new(MockTransport::new());
        assert!(matches!(bot.start().await, Err(BotError::InvalidBotId(_))));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (mut bot, _transport) = test_bot();
        bot.start().await.unwrap();
        assert!(matches!(bot.start().await, Err(BotError::AlreadyStarted)));
        bot.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let (mut bot, transport) = test_bot();
        bot.stop().await.unwrap();
        assert_eq!(transport.disconnect_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_notified_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let (bot, transport) = test_bot();
        let mut bot = bot.on_disconnect(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        bot.start().await.unwrap();
        transport.drop_connection();
        tokio::time::sleep(Duration::from_millis(50)).await;
        bot.stop().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_subscribe_closes_session() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let transport = MockTransport::with_subscribe_failure();
        let mut bot = Bot::new(transport.clone())
            .with_bot_id("test-bot")
            .with_secret("secret")
            .on_disconnect(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });

        assert!(matches!(bot.start().await, Err(BotError::TransportError(_))));
        assert!(!bot.is_running());
        assert!(!bot.is_connected());
        assert!(bot.dispatch_handle.is_none());
        assert_eq!(transport.disconnect_count(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Not left half-started, so a retry reaches the transport again
        assert!(matches!(bot.start().await, Err(BotError::TransportError(_))));
        assert_eq!(transport.connect_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_from_config_requires_secret() {
        let config = BotConfig::new("test-bot");
        let result = Bot::from_config(&config, MockTransport::new());
        assert!(matches!(result, Err(BotError::ConfigError(_))));
    }
}
