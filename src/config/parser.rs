//! Configuration file parsing (HOCON format).
//!
//! Files are written back as pretty JSON, which every HOCON reader accepts.

use std::fs;
use std::path::Path;

use hocon::HoconLoader;
use tracing::info;

use crate::common::error::{ConfigError, ConfigResult};
use crate::config::types::RelayConfig;

/// Load configuration from a HOCON file.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<RelayConfig> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.display().to_string(),
        source,
    })?;
    load_config_str(&content)
}

/// Load configuration from a HOCON string.
pub fn load_config_str(content: &str) -> ConfigResult<RelayConfig> {
    HoconLoader::new()
        .load_str(content)
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Write configuration to `path`, replacing any existing file.
pub fn save_config(path: impl AsRef<Path>, config: &RelayConfig) -> ConfigResult<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(config).map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;

    fs::write(path, content + "\n").map_err(|source| ConfigError::IoError {
        path: path.display().to_string(),
        source,
    })
}

/// Load the file at `path`, writing a default one first if it does not exist.
pub fn load_or_create(path: impl AsRef<Path>) -> ConfigResult<RelayConfig> {
    let path = path.as_ref();
    if path.exists() {
        info!("Config file {} found, loading", path.display());
        return load_config(path);
    }

    info!("Config file {} not found, creating defaults", path.display());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::IoError {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let config = RelayConfig::default();
    save_config(path, &config)?;
    Ok(config)
}
