//! Error types for the application.

use thiserror::Error;

/// Top-level relay error.
///
/// `Config` and `Auth` are fatal at startup. `Render` and `Delivery` are
/// per-event and only ever logged by the bridge.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Discord authentication failed: {reason}")]
    Auth { reason: String },

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Bridge cannot start while {state}")]
    InvalidState { state: &'static str },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    /// A credential was left empty or at its shipped placeholder.
    #[error("Please set {field} in the configuration")]
    Missing { field: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Outbound webhook delivery failure.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Webhook rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid webhook URL '{url}'")]
    InvalidEndpoint { url: String },
}

/// Template rendering failure for a single event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Rendered {event} message is empty")]
    Empty { event: &'static str },
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
