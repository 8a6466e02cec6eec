//! Game <-> Discord relay.
//!
//! ## Module Structure
//!
//! - `filter`: Inbound checks and regex filters
//! - `orchestrator`: The relay itself (`EventBridge`)
//! - `state`: Connection lifecycle (`BridgeState`)

pub mod filter;
pub mod orchestrator;
pub mod state;

pub use orchestrator::EventBridge;
