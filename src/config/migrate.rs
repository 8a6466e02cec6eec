//! Additive schema migrations for the settings file.
//!
//! Each migration introduces the keys a schema version added. Keys already
//! present in the file are left alone.

use tracing::info;

use crate::config::types::{MessagesConfig, RelayConfig, CURRENT_VERSION};

struct Migration {
    /// Version the file is at after this migration.
    version: u32,
    description: &'static str,
    apply: fn(&mut RelayConfig),
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 3,
    description: "connected/disconnected messages",
    apply: liveness_messages,
}];

fn liveness_messages(config: &mut RelayConfig) {
    let defaults = MessagesConfig::default();
    if config.messages.connected.is_empty() {
        config.messages.connected = defaults.connected;
    }
    if config.messages.disconnected.is_empty() {
        config.messages.disconnected = defaults.disconnected;
    }
}

/// Bring `config` up to [`CURRENT_VERSION`].
///
/// Returns `true` when anything ran and the file should be written back.
pub fn migrate(config: &mut RelayConfig) -> bool {
    let from = config.version;
    if from >= CURRENT_VERSION {
        return false;
    }

    info!(from, to = CURRENT_VERSION, "Updating settings file");
    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        info!(version = migration.version, "Applying migration: {}", migration.description);
        (migration.apply)(config);
    }
    config.version = CURRENT_VERSION;
    true
}
