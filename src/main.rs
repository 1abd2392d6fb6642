//! Toby command line client
//!
//! `toby run` starts an echo bot; the other subcommands issue a single server
//! command and print the platform's acknowledgment.

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, Notify};
use toby::config::BotConfig;
use toby::observability::init_from_config;
use toby::protocol::{find_hashtags, remove_hashtags, Message, Payload};
use toby::transport::mqtt::MqttClient;
use toby::transport::Transport;
use toby::{Bot, BotError, BotHandle, BotResult};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "toby.toml";

#[derive(Parser)]
#[command(name = "toby")]
#[command(about = "Client for the Toby bot platform")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bot ID, overriding the config file
    #[arg(long, env = "TOBY_BOT_ID")]
    bot_id: Option<String>,

    /// Bot secret, overriding the config file
    #[arg(long, env = "TOBY_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Broker URL, overriding the config file
    #[arg(long, value_name = "URL")]
    broker: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an echo bot that answers every message requesting an ack
    Run {
        /// Tag to follow once connected (repeatable)
        #[arg(long = "follow", value_name = "TAG")]
        follow: Vec<String>,
    },
    /// Send a message; tags default to the #hashtags in --text
    Send {
        /// Text to send; hashtags are stripped from the delivered message
        #[arg(long)]
        text: Option<String>,
        /// Raw JSON object payload, used instead of --text
        #[arg(long, conflicts_with = "text")]
        payload: Option<String>,
        /// Comma separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[command(flatten)]
        ack: AckArgs,
    },
    Follow {
        tag: String,
        #[command(flatten)]
        ack: AckArgs,
    },
    Unfollow {
        tag: String,
        #[command(flatten)]
        ack: AckArgs,
    },
    /// Enable webhooks signed with the given secret
    HooksOn {
        hook_secret: String,
        #[command(flatten)]
        ack: AckArgs,
    },
    HooksOff {
        #[command(flatten)]
        ack: AckArgs,
    },
    /// Show this bot's details
    Info {
        #[command(flatten)]
        ack: AckArgs,
    },
    /// Create a bot owned by this one
    CreateBot {
        id: String,
        password: String,
        #[command(flatten)]
        ack: AckArgs,
    },
    /// Create a socket credential
    CreateSocket {
        /// Keep the socket after its first connection closes
        #[arg(long)]
        persist: bool,
        #[command(flatten)]
        ack: AckArgs,
    },
    RemoveBot {
        target: String,
        #[command(flatten)]
        ack: AckArgs,
    },
    RemoveSocket {
        target: String,
        #[command(flatten)]
        ack: AckArgs,
    },
    /// Validate configuration
    Config {
        /// Print the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[derive(Args, Clone)]
struct AckArgs {
    /// Ack tag correlating the response; random when omitted
    #[arg(long)]
    ack: Option<String>,

    /// Seconds to wait for the acknowledgment
    #[arg(long, default_value_t = 5)]
    wait: u64,
}

impl AckArgs {
    fn tag(&self) -> String {
        self.ack
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

impl Commands {
    fn ack_args(&self) -> Option<&AckArgs> {
        match self {
            Commands::Send { ack, .. }
            | Commands::Follow { ack, .. }
            | Commands::Unfollow { ack, .. }
            | Commands::HooksOn { ack, .. }
            | Commands::HooksOff { ack }
            | Commands::Info { ack }
            | Commands::CreateBot { ack, .. }
            | Commands::CreateSocket { ack, .. }
            | Commands::RemoveBot { ack, .. }
            | Commands::RemoveSocket { ack, .. } => Some(ack),
            Commands::Run { .. } | Commands::Config { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = init_from_config(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let result = match &cli.command {
        Commands::Config { show } => show_config(&config, *show),
        Commands::Run { follow } => run_echo_bot(&config, follow.clone()).await,
        command => match command.ack_args() {
            Some(ack) => run_one_shot(&config, command, ack).await,
            None => Ok(()),
        },
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Config file (explicit, or `toby.toml` when present) with CLI overrides applied
fn load_configuration(cli: &Cli) -> BotResult<BotConfig> {
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    let mut config = match (&cli.config, &cli.bot_id) {
        (Some(path), _) => BotConfig::load_from_file(path)?,
        (None, _) if default_path.exists() => BotConfig::load_from_file(default_path)?,
        (None, Some(bot_id)) => BotConfig::new(bot_id.clone()),
        (None, None) => BotConfig::new(String::new()),
    };

    if let Some(bot_id) = &cli.bot_id {
        config.bot.id = bot_id.clone();
    }
    if let Some(secret) = &cli.secret {
        config.bot.secret = Some(secret.clone());
        config.bot.secret_env = None;
    }
    if let Some(broker) = &cli.broker {
        config.mqtt.broker_url = broker.clone();
    }

    config.validate()?;
    Ok(config)
}

fn show_config(config: &BotConfig, show: bool) -> BotResult<()> {
    config.resolve_secret()?;
    println!("Configuration for bot '{}' is valid", config.bot.id);

    if show {
        let mut redacted = config.clone();
        if redacted.bot.secret.is_some() {
            redacted.bot.secret = Some("***".to_string());
        }
        match toml::to_string_pretty(&redacted) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => warn!(error = %e, "Failed to render configuration"),
        }
    }
    Ok(())
}

fn mqtt_transport(config: &BotConfig) -> BotResult<MqttClient> {
    MqttClient::new(config.mqtt.clone()).map_err(BotError::transport)
}

async fn run_echo_bot(config: &BotConfig, follow: Vec<String>) -> BotResult<()> {
    let follow = Arc::new(follow);
    let disconnected = Arc::new(Notify::new());
    let on_disconnect = disconnected.clone();

    let mut bot = Bot::from_config(config, mqtt_transport(config)?)?
        .on_connect(move |bot| {
            let follow = follow.clone();
            async move {
                info!(bot_id = %bot.bot_id(), "Connected to Toby");
                for tag in follow.iter() {
                    if let Err(e) = bot.follow(tag, "").await {
                        error!(tag = %tag, error = %e, "Failed to follow tag");
                    }
                }
            }
        })
        .on_disconnect(move || {
            let disconnected = on_disconnect.clone();
            async move {
                info!("Disconnected from Toby");
                disconnected.notify_one();
            }
        })
        .on_message(|bot, topic, message| async move {
            echo(bot, topic, message).await;
        });

    bot.start().await?;
    info!("Echo bot running, press Ctrl-C to stop");

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Received Ctrl-C, shutting down");
        }
        _ = disconnected.notified() => {
            warn!("Connection lost");
        }
    }

    bot.stop().await
}

async fn echo<T: Transport>(bot: BotHandle<T>, topic: String, message: Message) {
    let body = serde_json::Value::Object(message.payload.clone());
    info!(
        topic = %topic,
        from = message.from.as_deref().unwrap_or(""),
        payload = %body,
        "Message received"
    );

    if !message.wants_ack() {
        return;
    }

    let text = message
        .payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let reply = Message::new(
        "",
        text_payload(&format!("I received your message '{text}'")),
        vec![message.ack.clone()],
        "",
    );
    if let Err(e) = bot.send(&reply).await {
        error!(ack = %message.ack, error = %e, "Failed to acknowledge message");
    }
}

fn text_payload(text: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("message".to_string(), json!(text));
    payload
}

async fn run_one_shot(config: &BotConfig, command: &Commands, ack: &AckArgs) -> BotResult<()> {
    let ack_tag = ack.tag();
    let (response_tx, mut response_rx) = mpsc::channel::<Message>(16);

    let mut bot = Bot::from_config(config, mqtt_transport(config)?)?
        .on_message(collect_responses::<MqttClient>(response_tx));

    bot.start().await?;
    let issued = issue_command(&bot.handle(), command, &ack_tag).await;

    if issued.is_ok() {
        let wait = Duration::from_secs(ack.wait);
        let response = tokio::time::timeout(wait, async {
            while let Some(message) = response_rx.recv().await {
                if message.ack == ack_tag || message.tags.contains(&ack_tag) {
                    return Some(message);
                }
            }
            None
        })
        .await;

        match response {
            Ok(Some(message)) => println!("{}", serde_json::to_string_pretty(&message)?),
            _ => warn!(ack = %ack_tag, wait_secs = ack.wait, "No acknowledgment received"),
        }
    }

    drop(response_rx);
    bot.stop().await?;
    issued
}

/// Inbound handler that hands responses to the one-shot waiter
fn collect_responses<T: Transport>(
    response_tx: mpsc::Sender<Message>,
) -> impl Fn(BotHandle<T>, String, Message) -> std::future::Ready<()> + Send + Sync + 'static {
    move |_bot, _topic, message| {
        // Never block dispatch on a response nobody is waiting for
        if let Err(e) = response_tx.try_send(message) {
            debug!(error = %e, "Dropping unawaited response");
        }
        std::future::ready(())
    }
}

async fn issue_command<T: Transport>(
    bot: &BotHandle<T>,
    command: &Commands,
    ack_tag: &str,
) -> BotResult<()> {
    match command {
        Commands::Send {
            text,
            payload,
            tags,
            ..
        } => {
            let (payload, mut tags) = match (payload, text) {
                (Some(raw), _) => (serde_json::from_str::<Payload>(raw)?, tags.clone()),
                (None, Some(text)) => {
                    let mut tags = tags.clone();
                    tags.extend(find_hashtags(text));
                    (text_payload(&remove_hashtags(text)), tags)
                }
                (None, None) => (Payload::new(), tags.clone()),
            };
            tags.sort();
            tags.dedup();
            bot.send(&Message::new("", payload, tags, ack_tag)).await
        }
        Commands::Follow { tag, .. } => bot.follow(tag, ack_tag).await,
        Commands::Unfollow { tag, .. } => bot.unfollow(tag, ack_tag).await,
        Commands::HooksOn { hook_secret, .. } => bot.hooks_on(hook_secret, ack_tag).await,
        Commands::HooksOff { .. } => bot.hooks_off(ack_tag).await,
        Commands::Info { .. } => bot.info(ack_tag).await,
        Commands::CreateBot { id, password, .. } => bot.create_bot(id, password, ack_tag).await,
        Commands::CreateSocket { persist, .. } => bot.create_socket(*persist, ack_tag).await,
        Commands::RemoveBot { target, .. } => bot.remove_bot(target, ack_tag).await,
        Commands::RemoveSocket { target, .. } => bot.remove_socket(target, ack_tag).await,
        Commands::Run { .. } | Commands::Config { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toby::testing::MockTransport;
    use toby::transport::Credentials;

    #[tokio::test]
    async fn test_echo_replies_on_ack_tag() {
        let transport = MockTransport::new();
        transport
            .connect(&Credentials::new("echo-bot", "secret"))
            .await
            .unwrap();
        let bot = Bot::new(transport.clone()).with_bot_id("echo-bot");

        let message = Message::new("alice", text_payload("hi"), Vec::new(), "a1");
        echo(bot.handle(), "news".to_string(), message).await;

        let sent = transport.published_on("server/echo-bot/send");
        assert_eq!(sent.len(), 1);
        let body: Value = serde_json::from_slice(&sent[0]).unwrap();
        assert_eq!(body["tags"], json!(["a1"]));
        assert_eq!(body["payload"]["message"], "I received your message 'hi'");
    }

    #[tokio::test]
    async fn test_echo_without_ack_stays_quiet() {
        let transport = MockTransport::new();
        transport
            .connect(&Credentials::new("echo-bot", "secret"))
            .await
            .unwrap();
        let bot = Bot::new(transport.clone()).with_bot_id("echo-bot");

        echo(bot.handle(), "news".to_string(), Message::default()).await;

        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_unread_responses_do_not_delay_stop() {
        let transport = MockTransport::new();
        let (response_tx, response_rx) = mpsc::channel::<Message>(1);
        let mut bot = Bot::new(transport.clone())
            .with_bot_id("one-shot")
            .with_secret("secret")
            .on_message(collect_responses::<MockTransport>(response_tx));

        bot.start().await.unwrap();
        for _ in 0..5 {
            transport
                .inject("client/one-shot/reply", r#"{"payload":{}}"#)
                .await;
        }
        drop(response_rx);

        let started = std::time::Instant::now();
        bot.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!bot.is_running());
    }
}
