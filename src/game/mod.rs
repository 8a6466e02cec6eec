//! Game server side of the relay.
//!
//! This module contains:
//! - The `GameServer` seam the relay talks to
//! - Message formatting with placeholder substitution
//! - A console adapter speaking JSON lines over stdin/stdout

pub mod console;
pub mod formatter;

use tokio::sync::mpsc;

use crate::common::GameEvent;

pub use console::ConsoleServer;

/// The game server the relay runs beside.
pub trait GameServer: Send + Sync {
    /// Start receiving game event notifications.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<GameEvent>;

    /// Stop delivering notifications; the subscribed stream then ends.
    fn unsubscribe(&self);

    /// Send a line to every connected player.
    fn broadcast(&self, line: &str);
}
