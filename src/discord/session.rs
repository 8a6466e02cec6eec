//! Discord gateway session.
//!
//! Wraps the serenity client: authenticates with the bot token, resolves
//! the relayed channel once ready, and turns every incoming message into a
//! [`RemoteMessage`] on the session stream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fancy_regex::Regex;
use serenity::all::{ChannelId as SerenityChannelId, GatewayError, ShardManager};
use serenity::async_trait;
use serenity::http::HttpBuilder;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::common::{Author, ChannelId, EventHub, RelayError, RemoteMessage};

/// How long to wait for the gateway's Ready event.
const READY_TIMEOUT: Duration = Duration::from_secs(15);

/// Opens sessions. Separate from the session so startup can be faked.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Authenticate and wait until the session is ready.
    async fn connect(
        &self,
        token: &str,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn RemoteSession>, RelayError>;
}

/// A connected session delivering incoming channel messages.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Start receiving incoming messages.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<RemoteMessage>;

    /// Stop delivering messages; the subscribed stream then ends.
    fn unsubscribe(&self);

    /// Disconnect from the gateway.
    async fn close(&self);
}

/// Connector for the real Discord gateway.
#[derive(Debug, Default)]
pub struct DiscordConnector;

impl DiscordConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionConnector for DiscordConnector {
    async fn connect(
        &self,
        token: &str,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn RemoteSession>, RelayError> {
        let session = DiscordSession::connect(token, channel_id).await?;
        Ok(Arc::new(session))
    }
}

/// Session backed by a running serenity client.
pub struct DiscordSession {
    messages: Arc<EventHub<RemoteMessage>>,
    shard_manager: Arc<ShardManager>,
}

impl DiscordSession {
    /// Log in and wait for Ready.
    ///
    /// A rejected token, a client error before Ready, or no Ready within
    /// [`READY_TIMEOUT`] is an authentication failure.
    pub async fn connect(token: &str, channel_id: ChannelId) -> Result<Self, RelayError> {
        let messages = Arc::new(EventHub::new());
        let (ready_tx, ready_rx) = oneshot::channel();

        let handler = SessionHandler::new(Arc::clone(&messages), channel_id, ready_tx);
        let mut client = build_client(token, handler).await?;
        let shard_manager = client.shard_manager.clone();

        let mut runner = tokio::spawn(async move { client.start().await });

        info!("Connecting to Discord...");
        tokio::select! {
            ready = ready_rx => match ready {
                Ok(()) => Ok(Self { messages, shard_manager }),
                Err(_) => Err(auth_failure("handler dropped before Ready")),
            },
            result = &mut runner => {
                let reason = match result {
                    Ok(Ok(())) => "client stopped before Ready".to_string(),
                    Ok(Err(serenity::Error::Gateway(GatewayError::InvalidAuthentication))) => {
                        "invalid bot token".to_string()
                    }
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => format!("client task failed: {}", e),
                };
                Err(auth_failure(&reason))
            },
            _ = tokio::time::sleep(READY_TIMEOUT) => {
                shard_manager.shutdown_all().await;
                Err(auth_failure("timed out waiting for Ready"))
            }
        }
    }
}

#[async_trait]
impl RemoteSession for DiscordSession {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<RemoteMessage> {
        self.messages.subscribe()
    }

    fn unsubscribe(&self) {
        self.messages.unsubscribe();
    }

    async fn close(&self) {
        info!("Initiating graceful Discord shutdown...");
        self.shard_manager.shutdown_all().await;
        info!("Discord shutdown complete");
    }
}

fn auth_failure(reason: &str) -> RelayError {
    RelayError::Auth {
        reason: reason.to_string(),
    }
}

async fn build_client(token: &str, handler: SessionHandler) -> Result<Client, RelayError> {
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    // Build a custom reqwest client with timeout settings
    let reqwest_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| auth_failure(&e.to_string()))?;

    let http = HttpBuilder::new(token).client(reqwest_client).build();

    serenity::client::ClientBuilder::new_with_http(http, intents)
        .event_handler(handler)
        .await
        .map_err(|e| auth_failure(&e.to_string()))
}

/// Gateway event handler feeding the session stream.
struct SessionHandler {
    messages: Arc<EventHub<RemoteMessage>>,
    channel_id: ChannelId,
    ready_tx: Mutex<Option<oneshot::Sender<()>>>,
    /// Custom emoji markup (`<:name:id>` or `<a:name:id>`).
    emoji_pattern: Regex,
}

impl SessionHandler {
    fn new(
        messages: Arc<EventHub<RemoteMessage>>,
        channel_id: ChannelId,
        ready_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            messages,
            channel_id,
            ready_tx: Mutex::new(Some(ready_tx)),
            emoji_pattern: Regex::new(r"<a?:([a-zA-Z0-9_]+):\d+>").unwrap(),
        }
    }

    /// Convert Discord custom emojis to `:name:`.
    fn custom_emojis_to_text(&self, content: &str) -> String {
        self.emoji_pattern.replace_all(content, ":$1:").to_string()
    }

    fn to_remote_message(&self, message: &Message, content: &str) -> RemoteMessage {
        RemoteMessage {
            author: Author {
                tag: message.author.tag(),
                // Webhook posts, ours included, count as automated.
                bot: message.author.bot || message.webhook_id.is_some(),
            },
            channel_id: message.channel_id.get(),
            content: self.custom_emojis_to_text(content),
        }
    }
}

#[async_trait]
impl EventHandler for SessionHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        match SerenityChannelId::new(self.channel_id).to_channel(&ctx.http).await {
            Ok(channel) => match channel.guild() {
                Some(channel) => info!(channel_id = self.channel_id, "Relaying Discord channel #{}", channel.name),
                None => warn!(channel_id = self.channel_id, "Relayed Discord channel is not a guild channel"),
            },
            Err(e) => warn!(
                channel_id = self.channel_id,
                "Could not resolve the relayed Discord channel: {}", e
            ),
        }

        let ready_tx = self.ready_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        match ready_tx {
            Some(tx) => {
                if tx.send(()).is_err() {
                    error!("Ready arrived after the session gave up waiting");
                }
            }
            None => debug!("Discord session resumed"),
        }
    }

    async fn message(&self, ctx: Context, message: Message) {
        let content = message.content_safe(&ctx.cache);
        let remote = self.to_remote_message(&message, &content);

        if !self.messages.publish(remote) {
            debug!("Dropping Discord message - no subscriber");
        }
    }
}
