//! Message records stored in a session

use super::types::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rough characters-per-token ratio used when no count is known
const CHARS_PER_TOKEN: usize = 4;

/// A message in the wire format of a chat-completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Common record behind directives, prompts and responses
///
/// `created_at` is fixed at construction and has no setter.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: Option<i64>,
    role: Role,
    /// The message content
    pub content: String,
    /// Tokens this message used up, as reported by the API
    pub tokens: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Message {
    pub(crate) fn new(role: Role, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            role,
            content: content.into(),
            tokens: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn restore(
        id: i64,
        role: Role,
        content: String,
        tokens: Option<i64>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            role,
            content,
            tokens,
            created_at,
            updated_at,
        }
    }

    /// Database id, `None` until the message has been saved
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Token estimate from the content length
    pub fn estimated_tokens(&self) -> i64 {
        let chars = self.content.chars().count();
        chars.div_ceil(CHARS_PER_TOKEN) as i64
    }

    /// Convert to request format (role and content only)
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.clone())
    }
}

/// A system message describing wanted behavior, e.g. "Only output Python code"
///
/// Sent with every request regardless of the context policy.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorDirective {
    message: Message,
}

impl BehaviorDirective {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            message: Message::new(Role::System, content),
        }
    }

    pub(crate) fn from_message(message: Message) -> Self {
        Self { message }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub(crate) fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// A user message sent for completion
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    message: Message,
    response: Option<Response>,
}

impl Prompt {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            message: Message::new(Role::User, content),
            response: None,
        }
    }

    pub(crate) fn from_message(message: Message) -> Self {
        Self {
            message,
            response: None,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub(crate) fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// The response completing this prompt, if any
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub(crate) fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    /// Attach the response. A prompt is completed at most once.
    pub fn respond(&mut self, response: Response) -> crate::Result<&Response> {
        if self.response.is_some() {
            return Err(crate::Error::Session(
                "prompt already has a response".to_string(),
            ));
        }
        Ok(self.response.insert(response))
    }
}

/// An assistant message completing exactly one prompt
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    message: Message,
    /// The raw JSON body returned by the API
    pub raw_json: String,
}

impl Response {
    pub fn new(content: impl Into<String>, tokens: Option<i64>, raw_json: impl Into<String>) -> Self {
        let mut message = Message::new(Role::Assistant, content);
        message.tokens = tokens;
        Self {
            message,
            raw_json: raw_json.into(),
        }
    }

    pub(crate) fn from_message(message: Message, raw_json: String) -> Self {
        Self { message, raw_json }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub(crate) fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// The outcome of one completion call, ready to be recorded in a session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
    pub content: String,
    /// Tokens of the request, as counted by the API
    pub prompt_tokens: Option<i64>,
    /// Tokens of the generated reply
    pub completion_tokens: Option<i64>,
    pub raw_json: String,
}
