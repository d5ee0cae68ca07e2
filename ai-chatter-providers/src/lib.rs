//! Chat-completion providers for ai-chatter
//!
//! [`ChatProvider`] is the seam the application talks to; [`OpenAiClient`]
//! implements it against an OpenAI-compatible HTTP API.

pub mod base;
pub mod openai;

pub use base::{ChatProvider, ChatResponse, ProviderError, ProviderResult, Usage};
pub use openai::OpenAiClient;
