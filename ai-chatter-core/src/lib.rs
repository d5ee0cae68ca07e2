//! Core types and traits for ai-chatter
//!
//! This crate provides the settings chain, the conversation model and its
//! SQLite persistence used by the other ai-chatter crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod utils;

pub use error::{Error, Result};

/// Application name used for directories, env prefixes and the database
pub const APP_NAME: &str = "ai_chatter";
