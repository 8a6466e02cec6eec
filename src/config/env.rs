//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `HERALD_DISCORD_TOKEN` - Discord bot token
//! - `HERALD_WEBHOOK_URL` - Discord webhook URL
//! - `HERALD_CHANNEL_ID` - Relayed Discord channel id

use std::env;

use tracing::warn;

use crate::config::types::RelayConfig;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "HERALD";

/// Apply environment variable overrides to a config.
///
/// Lets secrets stay out of the settings file. Overrides are never
/// written back to disk.
pub fn apply_env_overrides(config: RelayConfig) -> RelayConfig {
    apply_overrides(config, |key| env::var(key).ok())
}

/// [`apply_env_overrides`] reading variables through `lookup`.
fn apply_overrides<F>(mut config: RelayConfig, lookup: F) -> RelayConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(&format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        config.discord.token = token;
    }

    if let Some(webhook) = lookup(&format!("{}_WEBHOOK_URL", ENV_PREFIX)) {
        config.discord.webhook = webhook;
    }

    if let Some(channel) = lookup(&format!("{}_CHANNEL_ID", ENV_PREFIX)) {
        match channel.trim().parse() {
            Ok(id) => config.discord.channel_id = id,
            Err(_) => warn!("Ignoring {}_CHANNEL_ID: '{}' is not a channel id", ENV_PREFIX, channel),
        }
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `HERALD_CONFIG` environment variable, otherwise returns "herald.conf".
pub fn get_config_path() -> String {
    config_path_from(|key| env::var(key).ok())
}

fn config_path_from<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(&format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|| "herald.conf".to_string())
}
