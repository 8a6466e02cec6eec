//! Shared types used across the application.

use std::fmt;

/// Discord snowflake for a channel.
pub type ChannelId = u64;

/// Kind of game event, used to pick the per-event settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Chat,
    Join,
    Leave,
    Death,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Death => "death",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single occurrence reported by the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A player sent a chat line.
    Chat { player: String, message: String },
    /// A player joined the server.
    Joined { player: String },
    /// A player left the server.
    Left { player: String },
    /// A player died. `death_message` is the raw text the server produced,
    /// usually starting with the player's name.
    Died { player: String, death_message: String },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Chat { .. } => EventKind::Chat,
            Self::Joined { .. } => EventKind::Join,
            Self::Left { .. } => EventKind::Leave,
            Self::Died { .. } => EventKind::Death,
        }
    }

    /// Display name of the player the event is about.
    pub fn player(&self) -> &str {
        match self {
            Self::Chat { player, .. }
            | Self::Joined { player }
            | Self::Left { player }
            | Self::Died { player, .. } => player,
        }
    }
}

/// Author of a Discord message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Tag as shown to users (`name` or `name#1234`).
    pub tag: String,
    /// Bot accounts and webhook posts.
    pub bot: bool,
}

/// A message received on the Discord session stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMessage {
    pub author: Author,
    pub channel_id: ChannelId,
    /// Display content (mentions already resolved to names).
    pub content: String,
}

/// One webhook post. Built per send and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundNotification {
    /// Display name shown on the post.
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub body: String,
    /// Username to impersonate instead of `display_name`, for player chat.
    pub username_override: Option<String>,
}

impl OutboundNotification {
    /// A plain post using the webhook's own name and avatar.
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            display_name: None,
            avatar_url: None,
            body: body.into(),
            username_override: None,
        }
    }

    /// Name the webhook should post under.
    pub fn effective_username(&self) -> Option<&str> {
        self.username_override
            .as_deref()
            .or(self.display_name.as_deref())
    }
}
