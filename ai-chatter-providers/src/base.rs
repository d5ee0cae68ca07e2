//! Base trait for chat-completion providers

use ai_chatter_core::session::{ChatMessage, Completion};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Token usage as reported by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
}

/// Response from a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    /// `None` when the API did not report usage
    pub usage: Option<Usage>,
    pub finish_reason: String,
    /// The unmodified response body
    pub raw_json: String,
}

impl ChatResponse {
    /// Convert into the record a session stores
    pub fn into_completion(self) -> Completion {
        Completion {
            content: self.content,
            prompt_tokens: self.usage.map(|u| u.prompt_tokens),
            completion_tokens: self.usage.map(|u| u.completion_tokens),
            raw_json: self.raw_json,
        }
    }
}

/// Trait for chat-completion providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a chat completion request: the whole message list, behavior
    /// directive first and the new prompt last
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> ProviderResult<ChatResponse>;

    /// Get the default model for this provider
    fn default_model(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_completion_keeps_usage() {
        let response = ChatResponse {
            content: "ls -la".to_string(),
            usage: Some(Usage {
                prompt_tokens: 30,
                completion_tokens: 3,
                total_tokens: 33,
            }),
            finish_reason: "stop".to_string(),
            raw_json: "{}".to_string(),
        };
        let completion = response.into_completion();
        assert_eq!(completion.content, "ls -la");
        assert_eq!(completion.prompt_tokens, Some(30));
        assert_eq!(completion.completion_tokens, Some(3));
    }

    #[test]
    fn test_into_completion_without_usage() {
        let response = ChatResponse {
            content: String::new(),
            usage: None,
            finish_reason: "stop".to_string(),
            raw_json: "{}".to_string(),
        };
        let completion = response.into_completion();
        assert_eq!(completion.prompt_tokens, None);
        assert_eq!(completion.completion_tokens, None);
    }
}
