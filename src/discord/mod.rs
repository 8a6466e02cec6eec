//! Discord side of the relay.
//!
//! Outbound posts go through a webhook; inbound messages arrive on a
//! serenity gateway session.

pub mod session;
pub mod webhook;

pub use session::{DiscordConnector, RemoteSession, SessionConnector};
pub use webhook::{Dispatcher, WebhookDispatcher};
