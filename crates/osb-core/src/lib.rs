//! Core of the lookup bot: shard acquisition, federated search and the
//! framework-agnostic pieces the chat adapter builds on.
//!
//! Telegram lives behind the messaging port, implemented in `osb-telegram`.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod security;
pub mod session;
pub mod shards;

pub use errors::{Error, Result};
