//! OpenAI-compatible HTTP client

use ai_chatter_core::session::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::base::{ChatProvider, ChatResponse, ProviderError, ProviderResult, Usage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completion request format
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// Chat-completion response format
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the `/chat/completions` endpoint
pub struct OpenAiClient {
    client: Client,
    api_base: String,
    api_key: String,
    default_model: String,
}

impl OpenAiClient {
    /// Create a new client. `api_base` is the URL prefix up to and
    /// including the API version, e.g. `https://api.openai.com/v1`.
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        default_model: impl Into<String>,
    ) -> ProviderResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config("API key is empty".to_string()));
        }
        let api_base = api_base.into().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            return Err(ProviderError::Config("API base URL is empty".to_string()));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_base,
            api_key,
            default_model: default_model.into(),
        })
    }

    /// Parse a response body into our standard format
    fn parse_response(body: String) -> ProviderResult<ChatResponse> {
        let response: ChatCompletionResponse = serde_json::from_str(&body)?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: response.usage,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            raw_json: body,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> ProviderResult<ChatResponse> {
        let model = if model.trim().is_empty() {
            self.default_model.as_str()
        } else {
            model
        };
        let request = ChatCompletionRequest {
            model,
            messages: &messages,
        };

        debug!(
            "Sending chat request to {} with model {} ({} messages)",
            self.api_base,
            model,
            messages.len()
        );

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let body = response.text().await?;
        let parsed = Self::parse_response(body)?;
        debug!(
            "Received {} chars, finish_reason={}, usage={:?}",
            parsed.content.len(),
            parsed.finish_reason,
            parsed.usage
        );
        Ok(parsed)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const BODY: &str = r#"{
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}
        ],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    }"#;

    #[test]
    fn test_new_rejects_empty_key() {
        assert!(matches!(
            OpenAiClient::new("  ", "https://api.openai.com/v1", "gpt-4"),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn test_parse_response_keeps_raw_body() {
        let response = OpenAiClient::parse_response(BODY.to_string()).unwrap();
        assert_eq!(response.content, "Hello!");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
        assert_eq!(response.raw_json, BODY);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let err = OpenAiClient::parse_response(r#"{"choices": []}"#.to_string()).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_chat_sends_messages_in_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::Json(json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let client =
            OpenAiClient::new("sk-test", format!("{}/v1/", server.url()), "gpt-4").unwrap();
        let response = client
            .chat(
                "gpt-3.5-turbo",
                vec![ChatMessage::system("Be brief."), ChatMessage::user("Hi")],
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "Hello!");
        assert_eq!(response.usage.unwrap().prompt_tokens, 12);
    }

    #[tokio::test]
    async fn test_chat_falls_back_to_default_model() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-4"})))
            .with_status(200)
            .with_body(BODY)
            .create_async()
            .await;

        let client = OpenAiClient::new("sk-test", server.url(), "gpt-4").unwrap();
        client.chat("", vec![ChatMessage::user("Hi")]).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_reports_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let client = OpenAiClient::new("sk-bad", server.url(), "gpt-4").unwrap();
        let err = client
            .chat("gpt-4", vec![ChatMessage::user("Hi")])
            .await
            .unwrap_err();
        match err {
            ProviderError::Api(msg) => {
                assert!(msg.starts_with("HTTP 401"));
                assert!(msg.contains("Incorrect API key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
