//! Configuration parsing, migration and the shared settings snapshot.

pub mod env;
pub mod migrate;
pub mod parser;
pub mod store;
pub mod types;
pub mod validate;

pub use store::SettingsStore;
pub use types::*;
