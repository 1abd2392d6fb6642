//! Command surface shared by the bot and its callbacks
//!
//! Every command is a single fire-and-forget QoS 0 publish to
//! `server/{bot_id}/{command}`. Responses, when the platform sends any, come
//! back through the on-message callback carrying the same ack tag.

use crate::error::{BotError, BotResult};
use crate::protocol::{
    AckRequest, Command, CreateBotRequest, CreateSocketRequest, HooksOnRequest, Message,
    RemoveRequest, TagRequest, TopicBuilder,
};
use crate::transport::Transport;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

/// Cloneable handle for issuing commands on behalf of a bot
pub struct BotHandle<T: Transport> {
    bot_id: Arc<str>,
    transport: Arc<T>,
}

impl<T: Transport> Clone for BotHandle<T> {
    fn clone(&self) -> Self {
        Self {
            bot_id: self.bot_id.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: Transport> BotHandle<T> {
    pub(crate) fn new(bot_id: &str, transport: Arc<T>) -> Self {
        Self {
            bot_id: Arc::from(bot_id),
            transport,
        }
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Publish a message to the tags it carries
    pub async fn send(&self, message: &Message) -> BotResult<()> {
        let payload = message.encode()?;
        self.publish_command(Command::Send, payload.into_bytes())
            .await?;
        info!(tags = ?message.tags, ack = %message.ack, "Sent message");
        Ok(())
    }

    /// Subscribe the bot to messages published under `tag`
    pub async fn follow(&self, tag: &str, ack_tag: &str) -> BotResult<()> {
        let request = TagRequest {
            ack_tag: ack_tag.to_string(),
            tags: tag.to_string(),
        };
        self.publish_json(Command::Follow, &request).await?;
        info!("Followed #{}", tag);
        Ok(())
    }

    pub async fn unfollow(&self, tag: &str, ack_tag: &str) -> BotResult<()> {
        let request = TagRequest {
            ack_tag: ack_tag.to_string(),
            tags: tag.to_string(),
        };
        self.publish_json(Command::Unfollow, &request).await?;
        info!("Unfollowed #{}", tag);
        Ok(())
    }

    /// Turn on webhook delivery, signed with `hook_secret`
    pub async fn hooks_on(&self, hook_secret: &str, ack_tag: &str) -> BotResult<()> {
        let request = HooksOnRequest {
            ack_tag: ack_tag.to_string(),
            hook_secret: hook_secret.to_string(),
        };
        self.publish_json(Command::HooksOn, &request).await
    }

    pub async fn hooks_off(&self, ack_tag: &str) -> BotResult<()> {
        let request = AckRequest {
            ack_tag: ack_tag.to_string(),
        };
        self.publish_json(Command::HooksOff, &request).await
    }

    /// Ask the platform for this bot's details
    pub async fn info(&self, ack_tag: &str) -> BotResult<()> {
        let request = AckRequest {
            ack_tag: ack_tag.to_string(),
        };
        self.publish_json(Command::Info, &request).await
    }

    /// Create a bot owned by this one. The response carries `id` and `sk`.
    pub async fn create_bot(&self, id: &str, secret: &str, ack_tag: &str) -> BotResult<()> {
        let request = CreateBotRequest {
            ack_tag: ack_tag.to_string(),
            id: id.to_string(),
            secret: secret.to_string(),
        };
        self.publish_json(Command::CreateBot, &request).await
    }

    pub async fn create_socket(&self, persist: bool, ack_tag: &str) -> BotResult<()> {
        let request = CreateSocketRequest {
            ack_tag: ack_tag.to_string(),
            persist,
        };
        self.publish_json(Command::CreateSocket, &request).await
    }

    pub async fn remove_bot(&self, target_id: &str, ack_tag: &str) -> BotResult<()> {
        let request = RemoveRequest {
            ack_tag: ack_tag.to_string(),
            bot_id: target_id.to_string(),
        };
        self.publish_json(Command::RemoveBot, &request).await
    }

    pub async fn remove_socket(&self, target_id: &str, ack_tag: &str) -> BotResult<()> {
        let request = RemoveRequest {
            ack_tag: ack_tag.to_string(),
            bot_id: target_id.to_string(),
        };
        self.publish_json(Command::RemoveSocket, &request).await
    }

    async fn publish_json<P: Serialize>(&self, command: Command, body: &P) -> BotResult<()> {
        let payload = serde_json::to_vec(body)?;
        self.publish_command(command, payload).await
    }

    async fn publish_command(&self, command: Command, payload: Vec<u8>) -> BotResult<()> {
        let span = crate::command_span!(bot_id = %self.bot_id, command = %command);

        async move {
            if !self.transport.is_connected() {
                return Err(BotError::NotConnected);
            }

            let topic = TopicBuilder::command_topic(&self.bot_id, command);
            self.transport
                .publish(&topic, payload)
                .await
                .map_err(BotError::transport)?;

            debug!(topic = %topic, "Published command");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
