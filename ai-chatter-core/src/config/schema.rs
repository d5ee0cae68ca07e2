//! Settings schema definitions

use crate::session::ChatModel;
use crate::APP_NAME;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default chat-completion endpoint
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Root settings for ai-chatter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// The API key to use
    pub api_key: String,
    /// Base URL of the chat-completion API
    pub api_base: String,
    /// Where the session database lives, e.g. "~/.local/share/ai_chatter"
    pub data_dir: PathBuf,
    /// Settings concerning the session
    pub session_settings: SessionSettings,
    /// How much information to log
    pub verbosity: Verbosity,
    /// Whether the conversation should be saved
    pub persist: bool,
    /// Optional file that receives a copy of the log output
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            data_dir: default_data_dir(),
            session_settings: SessionSettings::default(),
            verbosity: Verbosity::default(),
            persist: true,
            log_file: None,
        }
    }
}

impl Settings {
    /// Path of the session database inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("session.db")
    }

    /// The API key, if one was configured
    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_NAME)))
}

/// Settings of a conversation session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// The model to use
    pub model: ChatModel,
    /// Maximum (estimated) tokens of history to send as context. Negative
    /// numbers send the complete history.
    pub context_size_tokens: i64,
    /// How many message pairs of history to send as context. Negative
    /// numbers send the complete history.
    pub context_size_messages: i64,
    /// Warn once a session has used more tokens than this. Negative numbers
    /// disable the warning.
    pub session_warn_size: i64,
    /// A behavior directive sent with every request
    pub behavior: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: ChatModel::default(),
            context_size_tokens: 8000,
            context_size_messages: -1,
            session_warn_size: -1,
            behavior: None,
        }
    }
}

/// Log verbosity, ordered from quietest to loudest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    #[default]
    Error,
    Warning,
    Info,
    Debug,
}

impl Verbosity {
    /// Map a `-v` occurrence count onto a verbosity level
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Error,
            1 => Verbosity::Warning,
            2 => Verbosity::Info,
            _ => Verbosity::Debug,
        }
    }

    /// The matching `tracing` filter directive
    pub fn as_filter(&self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warning => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warning => "warning",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
        }
    }

    fn from_level_number(level: i64) -> Option<Self> {
        // Numeric levels of the classic logging scale (ERROR=40 .. DEBUG=10)
        match level {
            40 => Some(Verbosity::Error),
            30 => Some(Verbosity::Warning),
            20 => Some(Verbosity::Info),
            10 => Some(Verbosity::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Verbosity::Error),
            "warning" | "warn" => Ok(Verbosity::Warning),
            "info" => Ok(Verbosity::Info),
            "debug" => Ok(Verbosity::Debug),
            other => other
                .parse::<i64>()
                .ok()
                .and_then(Verbosity::from_level_number)
                .ok_or_else(|| format!("unknown verbosity '{}'", s)),
        }
    }
}

impl Serialize for Verbosity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Level(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
            Raw::Level(level) => Verbosity::from_level_number(level).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown verbosity level {}", level))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.session_settings.model, ChatModel::Gpt4);
        assert_eq!(settings.session_settings.context_size_tokens, 8000);
        assert_eq!(settings.session_settings.context_size_messages, -1);
        assert_eq!(settings.session_settings.session_warn_size, -1);
        assert_eq!(settings.verbosity, Verbosity::Error);
        assert!(settings.persist);
        assert!(settings.api_key().is_none());
        assert!(settings.database_path().ends_with("session.db"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"session_settings": {"model": "gpt-3.5-turbo"}}"#).unwrap();
        assert_eq!(settings.session_settings.model, ChatModel::Gpt35Turbo);
        assert_eq!(settings.session_settings.context_size_tokens, 8000);
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_verbosity_accepts_names_and_levels() {
        let v: Verbosity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(v, Verbosity::Warning);
        let v: Verbosity = serde_json::from_str("10").unwrap();
        assert_eq!(v, Verbosity::Debug);
        assert!(serde_json::from_str::<Verbosity>("15").is_err());
        assert_eq!(serde_json::to_string(&Verbosity::Info).unwrap(), "\"info\"");
    }

    #[test]
    fn test_verbosity_from_count_saturates() {
        assert_eq!(Verbosity::from_count(0), Verbosity::Error);
        assert_eq!(Verbosity::from_count(2), Verbosity::Info);
        assert_eq!(Verbosity::from_count(9), Verbosity::Debug);
    }
}
