//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::config::types::{RelayConfig, PLACEHOLDER_TOKEN, PLACEHOLDER_WEBHOOK};

/// Validate a configuration and return detailed errors.
///
/// Unset credentials are reported first as [`ConfigError::Missing`] so the
/// operator sees exactly which key to fill in.
pub fn validate_config(config: &RelayConfig) -> Result<(), ConfigError> {
    if let Some(field) = first_missing_field(config) {
        return Err(ConfigError::Missing {
            field: field.to_string(),
        });
    }

    let mut errors = Vec::new();

    let webhook = config.discord.webhook.as_str();
    if !(webhook.starts_with("https://") || webhook.starts_with("http://")) {
        errors.push(format!("discord.webhook '{}' is not an http(s) URL", webhook));
    }

    if config.messages.chat_format.trim().is_empty() {
        errors.push("messages.chat_format is empty".to_string());
    }

    for (name, event) in [
        ("join", &config.events.join),
        ("leave", &config.events.leave),
        ("death", &config.events.death),
    ] {
        if event.enabled && event.format.trim().is_empty() {
            errors.push(format!("events.{}.format is empty but the event is enabled", name));
        }
    }

    // Validate filter patterns (try to compile them)
    for (direction, patterns) in [
        ("game_to_discord", &config.filters.game_to_discord),
        ("discord_to_game", &config.filters.discord_to_game),
    ] {
        for (i, pattern) in patterns.iter().enumerate() {
            if Regex::new(pattern).is_err() {
                errors.push(format!(
                    "filters.{}[{}] is not a valid regex: '{}'",
                    direction, i, pattern
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

/// First credential key that is empty or still at its shipped placeholder.
fn first_missing_field(config: &RelayConfig) -> Option<&'static str> {
    let token = config.discord.token.trim();
    if token.is_empty() || token == PLACEHOLDER_TOKEN {
        return Some("discord.token");
    }

    let webhook = config.discord.webhook.trim();
    if webhook.is_empty() || webhook.eq_ignore_ascii_case(PLACEHOLDER_WEBHOOK) {
        return Some("discord.webhook");
    }

    if config.discord.channel_id == 0 {
        return Some("discord.channel_id");
    }

    None
}
