//! Configuration type definitions.
//!
//! Every section carries defaults so a partial file (or an older one)
//! still deserializes; `version` is the exception and reads as 0 when
//! absent so migrations can tell old files apart.

use serde::{Deserialize, Deserializer, Serialize};

use crate::common::types::{ChannelId, EventKind};

/// Current schema version of the settings file.
pub const CURRENT_VERSION: u32 = 3;

/// Shipped placeholder for the bot token.
pub const PLACEHOLDER_TOKEN: &str = "YOUR_DISCORD_BOT_TOKEN";

/// Shipped placeholder for the webhook URL.
pub const PLACEHOLDER_WEBHOOK: &str = "https://discord.com/api/webhooks/YOUR_WEBHOOK";

/// Root configuration structure. Immutable once loaded; a reload builds a
/// new one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    #[serde(default)]
    pub version: u32,
    pub discord: DiscordConfig,
    pub messages: MessagesConfig,
    pub chat: ChatConfig,
    pub events: EventsConfig,
    pub filters: FiltersConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            discord: DiscordConfig::default(),
            messages: MessagesConfig::default(),
            chat: ChatConfig::default(),
            events: EventsConfig::default(),
            filters: FiltersConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Settings for a per-event notification, `None` for chat which has
    /// its own section.
    pub fn event(&self, kind: EventKind) -> Option<&EventConfig> {
        match kind {
            EventKind::Chat => None,
            EventKind::Join => Some(&self.events.join),
            EventKind::Leave => Some(&self.events.leave),
            EventKind::Death => Some(&self.events.death),
        }
    }
}

/// Discord connection settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token for the gateway session.
    pub token: String,
    /// Webhook URL used for every outbound post.
    pub webhook: String,
    /// The one channel relayed to and from the game.
    pub channel_id: ChannelId,
    /// Rewrite `@everyone`/`@here` in player chat.
    pub block_mass_mentions: bool,
    /// Replace unicode emoji with `:shortcode:` in game-bound lines.
    pub emoji_shortcodes: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: PLACEHOLDER_TOKEN.to_string(),
            webhook: PLACEHOLDER_WEBHOOK.to_string(),
            channel_id: 0,
            block_mass_mentions: false,
            emoji_shortcodes: true,
        }
    }
}

/// Relay-level texts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Posted once when the relay comes up.
    pub connected: String,
    /// Posted once when the relay shuts down.
    pub disconnected: String,
    /// Format for Discord -> game lines. `&` is the color marker.
    pub chat_format: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            connected: "Relay connected".to_string(),
            disconnected: "Relay disconnected".to_string(),
            chat_format: "&b&l[Discord] &r<{userTag}> {userMessage}".to_string(),
        }
    }
}

/// Player chat settings (game -> Discord).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatConfig {
    pub enabled: bool,
    /// Avatar URL template, `{username}` is the player name.
    pub avatar: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            avatar: "https://cravatar.eu/helmavatar/{username}/190.png".to_string(),
        }
    }
}

/// Avatar the event notifications post with unless configured otherwise.
pub const DEFAULT_EVENT_AVATAR: &str =
    "https://i.ibb.co/CwvByzp/a-4a2d4c71d0ec0c7f72792d7280a6529d.webp";

/// Per-event notification settings.
///
/// Keys missing from an event's section fall back to that event's own
/// defaults, not to blanks.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    #[serde(deserialize_with = "join_event")]
    pub join: EventConfig,
    #[serde(deserialize_with = "leave_event")]
    pub leave: EventConfig,
    #[serde(deserialize_with = "death_event")]
    pub death: EventConfig,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            join: EventConfig::join(),
            leave: EventConfig::leave(),
            death: EventConfig::death(),
        }
    }
}

/// Settings for one kind of event notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventConfig {
    pub enabled: bool,
    /// Display name of the post.
    pub name: String,
    /// Avatar URL of the post, empty for the webhook's own.
    pub avatar: String,
    /// Message template.
    pub format: String,
}

impl EventConfig {
    pub fn new(name: &str, format: &str) -> Self {
        Self {
            enabled: true,
            name: name.to_string(),
            avatar: DEFAULT_EVENT_AVATAR.to_string(),
            format: format.to_string(),
        }
    }

    pub fn join() -> Self {
        Self::new("Join Notification", "```{username} joined the game```")
    }

    pub fn leave() -> Self {
        Self::new("Leave Notification", "{username} left the game")
    }

    pub fn death() -> Self {
        Self::new("Death Notification", "```{username} {reason}```")
    }
}

/// The keys an event section may set.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventOverrides {
    enabled: Option<bool>,
    name: Option<String>,
    avatar: Option<String>,
    format: Option<String>,
}

impl EventOverrides {
    fn apply(self, base: EventConfig) -> EventConfig {
        EventConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            name: self.name.unwrap_or(base.name),
            avatar: self.avatar.unwrap_or(base.avatar),
            format: self.format.unwrap_or(base.format),
        }
    }
}

fn join_event<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EventConfig, D::Error> {
    Ok(EventOverrides::deserialize(deserializer)?.apply(EventConfig::join()))
}

fn leave_event<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EventConfig, D::Error> {
    Ok(EventOverrides::deserialize(deserializer)?.apply(EventConfig::leave()))
}

fn death_event<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EventConfig, D::Error> {
    Ok(EventOverrides::deserialize(deserializer)?.apply(EventConfig::death()))
}

/// Message filtering configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FiltersConfig {
    /// Patterns that drop player chat before it reaches Discord.
    pub game_to_discord: Vec<String>,
    /// Patterns that drop Discord messages before they reach the game.
    pub discord_to_game: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_placeholders() {
        let config = RelayConfig::default();
        assert_eq!(config.version, CURRENT_VERSION);
        assert_eq!(config.discord.token, PLACEHOLDER_TOKEN);
        assert_eq!(config.discord.webhook, PLACEHOLDER_WEBHOOK);
        assert!(config.events.join.enabled);
        assert!(config.events.death.format.contains("{reason}"));
    }

    #[test]
    fn test_event_lookup() {
        let config = RelayConfig::default();
        assert!(config.event(EventKind::Chat).is_none());
        assert_eq!(
            config.event(EventKind::Leave).map(|e| e.name.as_str()),
            Some("Leave Notification")
        );
    }

    #[test]
    fn test_partial_event_keeps_its_own_defaults() {
        let config: RelayConfig = serde_json::from_str(
            r#"{"events": {"join": {"avatar": "https://example.com/a.png"}, "death": {"enabled": false}}}"#,
        )
        .unwrap();

        assert_eq!(config.events.join.avatar, "https://example.com/a.png");
        assert_eq!(config.events.join.name, "Join Notification");
        assert_eq!(config.events.join.format, "```{username} joined the game```");
        assert!(!config.events.death.enabled);
        assert_eq!(config.events.death.format, "```{username} {reason}```");
        assert_eq!(config.events.leave, EventConfig::leave());
    }
}
