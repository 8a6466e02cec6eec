//! Message filtering.
//!
//! Two layers: the inbound checks every Discord message must pass before it
//! reaches the game (author, channel, emptiness), and optional regex
//! patterns that block unwanted content in either direction.

use std::sync::{Arc, Mutex};

use fancy_regex::Regex;
use tracing::{debug, warn};

use crate::common::RemoteMessage;
use crate::config::types::{FiltersConfig, RelayConfig};

/// Why an inbound message was not relayed. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReject {
    /// Bot account or webhook post, including our own.
    Automated,
    /// Posted in a channel other than the relayed one.
    WrongChannel,
    /// Nothing left after trimming.
    Empty,
    /// Matched a configured filter pattern.
    Pattern,
}

/// Run the inbound checks on a Discord message.
///
/// Pure predicate over the message and one config snapshot. Compiles the
/// configured patterns on every call; the bridge uses [`evaluate_with`] and
/// a [`FilterCache`] instead.
pub fn evaluate(message: &RemoteMessage, config: &RelayConfig) -> Result<(), FilterReject> {
    if config.filters.discord_to_game.is_empty() {
        evaluate_with(message, config, &MessageFilter::empty())
    } else {
        evaluate_with(message, config, &MessageFilter::new(&config.filters))
    }
}

/// [`evaluate`] with already compiled patterns.
pub fn evaluate_with(
    message: &RemoteMessage,
    config: &RelayConfig,
    filter: &MessageFilter,
) -> Result<(), FilterReject> {
    if message.author.bot {
        return Err(FilterReject::Automated);
    }
    if message.channel_id != config.discord.channel_id {
        return Err(FilterReject::WrongChannel);
    }
    if message.content.trim().is_empty() {
        return Err(FilterReject::Empty);
    }
    if filter.should_filter(FilterDirection::DiscordToGame, &message.content) {
        return Err(FilterReject::Pattern);
    }
    Ok(())
}

/// Whether a Discord message should be forwarded to the game.
pub fn accepts(message: &RemoteMessage, config: &RelayConfig) -> bool {
    evaluate(message, config).is_ok()
}

/// Direction of message flow for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDirection {
    /// Game to Discord.
    GameToDiscord,
    /// Discord to game.
    DiscordToGame,
}

/// Message filter that checks messages against regex patterns.
#[derive(Debug, Clone)]
pub struct MessageFilter {
    game_to_discord_patterns: Vec<CompiledPattern>,
    discord_to_game_patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl MessageFilter {
    /// Create a new message filter from the configured patterns.
    ///
    /// Invalid regex patterns are logged and skipped.
    pub fn new(config: &FiltersConfig) -> Self {
        Self {
            game_to_discord_patterns: compile_patterns(&config.game_to_discord),
            discord_to_game_patterns: compile_patterns(&config.discord_to_game),
        }
    }

    /// Create an empty filter that allows all messages.
    pub fn empty() -> Self {
        Self {
            game_to_discord_patterns: Vec::new(),
            discord_to_game_patterns: Vec::new(),
        }
    }

    /// Returns `true` if the message matches any pattern for `direction`
    /// and should be blocked.
    pub fn should_filter(&self, direction: FilterDirection, message: &str) -> bool {
        let patterns = match direction {
            FilterDirection::GameToDiscord => &self.game_to_discord_patterns,
            FilterDirection::DiscordToGame => &self.discord_to_game_patterns,
        };

        patterns.iter().any(|p| {
            p.regex.is_match(message).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }

    /// Returns true if the filter has any patterns configured.
    pub fn has_patterns(&self) -> bool {
        !self.game_to_discord_patterns.is_empty() || !self.discord_to_game_patterns.is_empty()
    }
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern.clone(),
                regex,
            }),
            Err(e) => {
                warn!("Invalid filter regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

/// Compiled patterns for the most recent config snapshot.
///
/// Recompiles only when handed a different snapshot than last time.
#[derive(Debug, Default)]
pub struct FilterCache {
    cached: Mutex<Option<(Arc<RelayConfig>, Arc<MessageFilter>)>>,
}

impl FilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_config(&self, config: &Arc<RelayConfig>) -> Arc<MessageFilter> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((snapshot, filter)) = cached.as_ref() {
            if Arc::ptr_eq(snapshot, config) {
                return Arc::clone(filter);
            }
        }

        let filter = Arc::new(MessageFilter::new(&config.filters));
        if filter.has_patterns() {
            debug!(
                game_to_discord = filter.game_to_discord_patterns.len(),
                discord_to_game = filter.discord_to_game_patterns.len(),
                "Compiled message filters"
            );
        }
        *cached = Some((Arc::clone(config), Arc::clone(&filter)));
        filter
    }
}
