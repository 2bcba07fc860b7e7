//! clanpulse-discord - Discord REST gateway for clanpulse.
//!
//! Provides the `ChatGateway` implementation the core engine uses to pull
//! channel history and deliver role-addressed alerts on Discord.
//!
//! # Example
//!
//! ```ignore
//! use clanpulse_discord::{DiscordConfig, DiscordRestGateway};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(DiscordRestGateway::new(DiscordConfig::from_env()?)?);
//! let mut tracker = clanpulse_core::ActivityTracker::new(config, gateway)?;
//! ```

mod rest;
mod types;

pub use rest::{DiscordConfig, DiscordRestGateway, DEFAULT_API_BASE};
pub use types::{DiscordAuthor, DiscordMessage};
