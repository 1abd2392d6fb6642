//! Topic construction and bot ID validation for the Toby namespace
//!
//! Every bot owns two topic trees on the broker:
//!
//! - `client/{bot_id}/...` carries messages from the platform to the bot
//! - `server/{bot_id}/{command}` carries commands from the bot to the platform

use std::fmt;
use thiserror::Error;

/// Commands the platform accepts under `server/{bot_id}/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Send,
    Follow,
    Unfollow,
    HooksOn,
    HooksOff,
    Info,
    CreateBot,
    CreateSocket,
    RemoveBot,
    RemoveSocket,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::Send,
        Command::Follow,
        Command::Unfollow,
        Command::HooksOn,
        Command::HooksOff,
        Command::Info,
        Command::CreateBot,
        Command::CreateSocket,
        Command::RemoveBot,
        Command::RemoveSocket,
    ];

    /// Topic suffix for this command
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Send => "send",
            Command::Follow => "follow",
            Command::Unfollow => "unfollow",
            Command::HooksOn => "hooks-on",
            Command::HooksOff => "hooks-off",
            Command::Info => "info",
            Command::CreateBot => "create-bot",
            Command::CreateSocket => "create-socket",
            Command::RemoveBot => "remove-bot",
            Command::RemoveSocket => "remove-socket",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic construction for the `client/` and `server/` namespaces
pub struct TopicBuilder;

impl TopicBuilder {
    /// Wildcard subscription for everything addressed to the bot: `client/{bot_id}/#`
    pub fn inbound_subscription(bot_id: &str) -> String {
        format!("client/{bot_id}/#")
    }

    /// Prefix shared by every inbound topic: `client/{bot_id}/`
    pub fn inbound_prefix(bot_id: &str) -> String {
        format!("client/{bot_id}/")
    }

    /// Command topic: `server/{bot_id}/{command}`
    pub fn command_topic(bot_id: &str, command: Command) -> String {
        format!("server/{bot_id}/{command}")
    }

    /// Drop the `client/{bot_id}` namespace from an inbound topic.
    ///
    /// `client/abc/foo/bar` becomes `foo/bar`. Topics with no segments past the
    /// namespace become the empty string.
    pub fn strip_namespace(topic: &str) -> String {
        let mut segments = topic.splitn(3, '/');
        segments.next();
        segments.next();
        segments.next().unwrap_or_default().to_string()
    }
}

/// Check that a bot ID can be embedded in a topic without changing its structure
pub fn validate_bot_id(bot_id: &str) -> Result<(), ValidationError> {
    if bot_id.is_empty() {
        return Err(ValidationError::EmptyBotId);
    }

    for ch in bot_id.chars() {
        if matches!(ch, '/' | '#' | '+') || ch.is_whitespace() || ch.is_control() {
            return Err(ValidationError::InvalidBotIdChar(ch));
        }
    }

    Ok(())
}

/// Bot identity validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Bot ID cannot be empty")]
    EmptyBotId,
    #[error("Bot ID contains invalid character: '{0}'")]
    InvalidBotIdChar(char),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inbound_topics() {
        assert_eq!(TopicBuilder::inbound_subscription("abc"), "client/abc/#");
        assert_eq!(TopicBuilder::inbound_prefix("abc"), "client/abc/");
    }

    #[test]
    fn test_command_topics() {
        let expected = [
            (Command::Send, "server/abc/send"),
            (Command::Follow, "server/abc/follow"),
            (Command::Unfollow, "server/abc/unfollow"),
            (Command::HooksOn, "server/abc/hooks-on"),
            (Command::HooksOff, "server/abc/hooks-off"),
            (Command::Info, "server/abc/info"),
            (Command::CreateBot, "server/abc/create-bot"),
            (Command::CreateSocket, "server/abc/create-socket"),
            (Command::RemoveBot, "server/abc/remove-bot"),
            (Command::RemoveSocket, "server/abc/remove-socket"),
        ];

        for (command, topic) in expected {
            assert_eq!(TopicBuilder::command_topic("abc", command), topic);
        }
        assert_eq!(Command::ALL.len(), expected.len());
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(TopicBuilder::strip_namespace("client/abc/foo/bar"), "foo/bar");
        assert_eq!(TopicBuilder::strip_namespace("client/abc/foo"), "foo");
        assert_eq!(TopicBuilder::strip_namespace("client/abc/"), "");
        assert_eq!(TopicBuilder::strip_namespace("client/abc"), "");
        assert_eq!(TopicBuilder::strip_namespace("client"), "");
        assert_eq!(TopicBuilder::strip_namespace(""), "");
    }

    #[test]
    fn test_bot_id_validation_examples() {
        assert!(validate_bot_id("my-bot").is_ok());
        assert!(validate_bot_id("bot_123").is_ok());
        assert!(validate_bot_id("Bot.Test").is_ok());
        assert!(validate_bot_id("a").is_ok());

        assert_eq!(validate_bot_id(""), Err(ValidationError::EmptyBotId));
        assert_eq!(
            validate_bot_id("bot/path"),
            Err(ValidationError::InvalidBotIdChar('/'))
        );
        assert_eq!(
            validate_bot_id("bot#"),
            Err(ValidationError::InvalidBotIdChar('#'))
        );
        assert_eq!(
            validate_bot_id("bot+1"),
            Err(ValidationError::InvalidBotIdChar('+'))
        );
        assert_eq!(
            validate_bot_id("my bot"),
            Err(ValidationError::InvalidBotIdChar(' '))
        );
    }

    proptest! {
        #[test]
        fn strip_namespace_recovers_suffix(
            id in "[a-zA-Z0-9._-]{1,32}",
            suffix in "[a-z0-9/]{0,40}"
        ) {
            let topic = format!("{}{}", TopicBuilder::inbound_prefix(&id), suffix);
            prop_assert_eq!(TopicBuilder::strip_namespace(&topic), suffix);
        }

        #[test]
        fn valid_ids_produce_single_level_namespace(id in "[a-zA-Z0-9._-]{1,64}") {
            prop_assert!(validate_bot_id(&id).is_ok());
            let topic = TopicBuilder::command_topic(&id, Command::Info);
            prop_assert_eq!(topic.split('/').count(), 3);
        }
    }
}
