//! Session data structures

use super::message::{BehaviorDirective, ChatMessage, Completion, Message, Prompt, Response};
use super::types::ChatModel;
use crate::config::SessionSettings;
use chrono::{DateTime, Utc};

/// A conversation: ordered prompts, each optionally completed by a response
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: Option<i64>,
    /// The model to use
    pub model: ChatModel,
    /// How many answered prompt/response pairs to send as context.
    /// Negative sends the complete history, zero sends none.
    pub context_size: i64,
    /// Token budget for the history sent as context.
    /// Negative is unlimited, zero sends none.
    pub context_size_tokens: i64,
    behavior: Option<BehaviorDirective>,
    prompts: Vec<Prompt>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session
    pub fn new(model: ChatModel, context_size: i64, behavior: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            model,
            context_size,
            context_size_tokens: -1,
            behavior: behavior.map(BehaviorDirective::new),
            prompts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a session from [`SessionSettings`]
    pub fn from_settings(settings: &SessionSettings) -> Self {
        let mut session = Self::new(
            settings.model.clone(),
            settings.context_size_messages,
            settings.behavior.clone(),
        );
        session.context_size_tokens = settings.context_size_tokens;
        session
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: i64,
        model: ChatModel,
        context_size: i64,
        context_size_tokens: i64,
        behavior: Option<BehaviorDirective>,
        prompts: Vec<Prompt>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            model,
            context_size,
            context_size_tokens,
            behavior,
            prompts,
            created_at,
            updated_at,
        }
    }

    /// Database id, `None` until the session has been saved
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn behavior(&self) -> Option<&BehaviorDirective> {
        self.behavior.as_ref()
    }

    pub(crate) fn behavior_mut(&mut self) -> Option<&mut BehaviorDirective> {
        self.behavior.as_mut()
    }

    /// Replace the behavior directive
    pub fn set_behavior(&mut self, content: impl Into<String>) {
        self.behavior = Some(BehaviorDirective::new(content));
        self.touch();
    }

    pub fn clear_behavior(&mut self) {
        self.behavior = None;
        self.touch();
    }

    /// The prompts sent so far
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub(crate) fn prompts_mut(&mut self) -> &mut [Prompt] {
        &mut self.prompts
    }

    /// Prompt/response pairs in order
    pub fn history(&self) -> Vec<(&Prompt, Option<&Response>)> {
        self.prompts.iter().map(|p| (p, p.response())).collect()
    }

    /// Pairs that already have a response
    pub fn answered(&self) -> Vec<(&Prompt, &Response)> {
        self.prompts
            .iter()
            .filter_map(|p| p.response().map(|r| (p, r)))
            .collect()
    }

    /// All responses in order
    pub fn responses(&self) -> Vec<&Response> {
        self.prompts.iter().filter_map(Prompt::response).collect()
    }

    /// A flat list of messages: prompt, response, prompt, ...
    pub fn messages(&self) -> Vec<&Message> {
        let mut messages = Vec::with_capacity(self.prompts.len() * 2);
        for prompt in &self.prompts {
            messages.push(prompt.message());
            if let Some(response) = prompt.response() {
                messages.push(response.message());
            }
        }
        messages
    }

    /// Number of tokens used up by the messages in this session
    pub fn tokens(&self) -> i64 {
        self.messages().iter().filter_map(|m| m.tokens).sum()
    }

    /// Whether the token total went past `limit`. Negative limits never warn.
    pub fn exceeds_warn_size(&self, limit: i64) -> bool {
        limit >= 0 && self.tokens() > limit
    }

    /// Answered pairs selected by the context policy, oldest first
    pub fn context_pairs(&self) -> Vec<(&Prompt, &Response)> {
        let answered = self.answered();

        let mut selected = match self.context_size {
            n if n < 0 => answered,
            0 => Vec::new(),
            n => {
                let keep = usize::try_from(n).unwrap_or(usize::MAX);
                let start = answered.len().saturating_sub(keep);
                answered[start..].to_vec()
            }
        };

        match self.context_size_tokens {
            n if n < 0 => {}
            0 => selected.clear(),
            budget => {
                let pair_tokens = |(p, r): &(&Prompt, &Response)| {
                    p.message().estimated_tokens() + r.message().estimated_tokens()
                };
                let mut total: i64 = selected.iter().map(pair_tokens).sum();
                let mut drop = 0;
                while drop < selected.len() && total > budget {
                    total -= pair_tokens(&selected[drop]);
                    drop += 1;
                }
                selected.drain(..drop);
            }
        }

        selected
    }

    /// The context to send with the next request: the behavior directive
    /// followed by the selected history
    pub fn context(&self) -> Vec<ChatMessage> {
        let mut context = Vec::new();
        if let Some(behavior) = &self.behavior {
            context.push(behavior.message().to_chat_message());
        }
        for (prompt, response) in self.context_pairs() {
            context.push(prompt.message().to_chat_message());
            context.push(response.message().to_chat_message());
        }
        context
    }

    /// Full request for a new prompt
    pub fn request_for(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = self.context();
        messages.push(ChatMessage::user(prompt));
        messages
    }

    /// Record a completed exchange and return the response
    pub fn record_exchange(
        &mut self,
        prompt: impl Into<String>,
        completion: Completion,
    ) -> crate::Result<&Response> {
        let mut entry = Prompt::new(prompt);
        entry.message_mut().tokens = completion.prompt_tokens;
        entry.respond(Response::new(
            completion.content,
            completion.completion_tokens,
            completion.raw_json,
        ))?;
        self.prompts.push(entry);
        self.touch();

        self.prompts
            .last()
            .and_then(Prompt::response)
            .ok_or_else(|| crate::Error::Session("recorded prompt lost its response".to_string()))
    }

    /// Append a prompt that has not been answered (yet)
    pub fn push_prompt(&mut self, prompt: Prompt) {
        self.prompts.push(prompt);
        self.touch();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ChatModel::default(), -1, None)
    }
}
