//! Configuration management
//!
//! Handles layering ai-chatter settings from defaults, config files, command
//! line overrides and environment variables.

pub mod loader;
pub mod schema;
pub mod validate;

pub use loader::{SettingsLoader, SettingsOverrides, ENV_PREFIX};
pub use schema::*;
pub use validate::{require_api_key, validate_settings};
