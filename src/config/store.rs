//! Shared settings snapshot with reload.
//!
//! The current [`RelayConfig`] lives behind a `watch` channel as an
//! `Arc`. A reload builds a complete new config and swaps the `Arc`, so a
//! reader holding a snapshot never observes a half-applied reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::common::error::ConfigResult;
use crate::config::env::apply_env_overrides;
use crate::config::migrate::migrate;
use crate::config::parser::{load_or_create, save_config};
use crate::config::types::RelayConfig;
use crate::config::validate::validate_config;

/// Load, migrate, override and validate the settings file at `path`.
///
/// Migrated files are written back before environment overrides are
/// applied, so secrets from the environment never reach disk.
pub fn load_and_validate(path: impl AsRef<Path>) -> ConfigResult<RelayConfig> {
    let path = path.as_ref();
    let mut config = load_or_create(path)?;

    if migrate(&mut config) {
        save_config(path, &config)?;
        info!("Settings file {} updated to version {}", path.display(), config.version);
    }

    let config = apply_env_overrides(config);
    validate_config(&config)?;
    Ok(config)
}

/// Holder of the current settings snapshot.
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: watch::Sender<Arc<RelayConfig>>,
}

impl SettingsStore {
    /// Load the settings file and wrap it in a store.
    pub fn open(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let config = load_and_validate(&path)?;
        let (current, _) = watch::channel(Arc::new(config));
        Ok(Self {
            path: Some(path),
            current,
        })
    }

    /// A store over an in-memory config. `reload` keeps it unchanged.
    pub fn from_config(config: RelayConfig) -> Self {
        let (current, _) = watch::channel(Arc::new(config));
        Self {
            path: None,
            current,
        }
    }

    /// The current snapshot. Take one per event and use it throughout.
    pub fn snapshot(&self) -> Arc<RelayConfig> {
        self.current.borrow().clone()
    }

    /// Replace the snapshot wholesale.
    pub fn replace(&self, config: RelayConfig) {
        self.current.send_replace(Arc::new(config));
    }

    /// Re-read the settings file.
    ///
    /// On error the previous snapshot stays in place.
    pub fn reload(&self) -> ConfigResult<Arc<RelayConfig>> {
        let Some(path) = self.path.as_ref() else {
            return Ok(self.snapshot());
        };

        let config = load_and_validate(path)?;
        let previous = self.snapshot();
        if previous.discord.token != config.discord.token {
            warn!("discord.token changed; the new token takes effect on restart");
        }

        let config = Arc::new(config);
        self.current.send_replace(Arc::clone(&config));
        info!("Settings reloaded from {}", path.display());
        Ok(config)
    }
}
