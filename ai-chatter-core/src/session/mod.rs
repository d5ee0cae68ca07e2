//! Conversation model and its persistence
//!
//! A session is an ordered list of prompts, each completed by at most one
//! response, plus an optional behavior directive. [`SessionManager`] stores
//! sessions in a SQLite database.

pub mod manager;
pub mod message;
pub mod store;
pub mod types;

pub use manager::{SessionInfo, SessionManager};
pub use message::{BehaviorDirective, ChatMessage, Completion, Message, Prompt, Response};
pub use store::Session;
pub use types::{ChatModel, Role};
