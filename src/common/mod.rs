//! Common utilities and types shared across the application.

pub mod error;
pub mod subscription;
pub mod types;

pub use error::{DeliveryError, RelayError, RenderError};
pub use subscription::EventHub;
pub use types::{Author, ChannelId, EventKind, GameEvent, OutboundNotification, RemoteMessage};
