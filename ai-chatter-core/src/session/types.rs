//! Controlled vocabularies shared by sessions and settings

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat model a session talks to
///
/// Unknown names are kept as [`ChatModel::Custom`] so newer hosted models
/// work without a release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ChatModel {
    /// The most capable model
    #[default]
    Gpt4,
    /// The older and cheaper model
    Gpt35Turbo,
    Custom(String),
}

impl ChatModel {
    pub fn as_str(&self) -> &str {
        match self {
            ChatModel::Gpt4 => "gpt-4",
            ChatModel::Gpt35Turbo => "gpt-3.5-turbo",
            ChatModel::Custom(name) => name,
        }
    }
}

impl From<&str> for ChatModel {
    fn from(name: &str) -> Self {
        match name {
            "gpt-4" => ChatModel::Gpt4,
            "gpt-3.5-turbo" => ChatModel::Gpt35Turbo,
            other => ChatModel::Custom(other.to_string()),
        }
    }
}

impl From<String> for ChatModel {
    fn from(name: String) -> Self {
        ChatModel::from(name.as_str())
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChatModel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChatModel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(ChatModel::from)
    }
}
