//! The application runtime shared by all programs

use ai_chatter_core::config::{require_api_key, Settings};
use ai_chatter_core::session::{Session, SessionManager};
use ai_chatter_core::APP_NAME;
use ai_chatter_providers::{ChatProvider, OpenAiClient};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::communicator::{CliCommunicator, Communicator};
use crate::error::AppResult;

/// Something to do with an [`Application`]: a chat loop, a one-shot question
#[async_trait]
pub trait Program: Send {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    /// The main functionality of the program
    async fn run(&mut self, app: &mut Application) -> AppResult<()>;
}

/// Owns everything a program needs to talk to the model
pub struct Application {
    settings: Settings,
    session: Session,
    provider: Box<dyn ChatProvider>,
    communicator: Box<dyn Communicator>,
    manager: Option<SessionManager>,
}

impl Application {
    /// Build an application from settings
    ///
    /// Fails before doing anything else when no API key is configured.
    pub fn new(settings: Settings) -> AppResult<Self> {
        let api_key = require_api_key(&settings)?.to_string();

        let provider = OpenAiClient::new(
            api_key,
            settings.api_base.clone(),
            settings.session_settings.model.as_str(),
        )?;
        let session = Session::from_settings(&settings.session_settings);

        let manager = if settings.persist {
            info!(
                "Persisting data for {} in {}",
                APP_NAME,
                settings.data_dir.display()
            );
            Some(SessionManager::open(settings.database_path())?)
        } else {
            debug!("Running without persistence");
            None
        };

        Ok(Self {
            settings,
            session,
            provider: Box::new(provider),
            communicator: Box::new(CliCommunicator::new()),
            manager,
        })
    }

    pub fn with_provider(mut self, provider: impl ChatProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    pub fn with_communicator(mut self, communicator: impl Communicator + 'static) -> Self {
        self.communicator = Box::new(communicator);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn communicator(&mut self) -> &mut dyn Communicator {
        self.communicator.as_mut()
    }

    /// Send `prompt` with the session's context and record the exchange
    pub async fn complete(&mut self, prompt: &str) -> AppResult<String> {
        let request = self.session.request_for(prompt);
        debug!(
            "Requesting completion from {} with {} messages",
            self.session.model,
            request.len()
        );

        let response = self
            .provider
            .chat(self.session.model.as_str(), request)
            .await?;
        let content = self
            .session
            .record_exchange(prompt, response.into_completion())?
            .content()
            .to_string();

        self.persist()?;

        let limit = self.settings.session_settings.session_warn_size;
        if self.session.exceeds_warn_size(limit) {
            let tokens = self.session.tokens();
            warn!("Session uses {} tokens, warn size is {}", tokens, limit);
            self.communicator.show_warning(&format!(
                "This session has used {} tokens, more than the configured {}.",
                tokens, limit
            ))?;
        }

        Ok(content)
    }

    /// Run `program`, then store the session one last time
    pub async fn start(&mut self, program: &mut dyn Program) -> AppResult<()> {
        info!("Starting {}.{}", APP_NAME, program.name());
        program.run(self).await?;
        self.persist()?;
        info!("{} finished", program.name());
        Ok(())
    }

    fn persist(&mut self) -> AppResult<()> {
        if let Some(manager) = self.manager.as_mut() {
            manager.save(&mut self.session)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use ai_chatter_core::config::Settings;
    use ai_chatter_core::session::ChatMessage;
    use ai_chatter_providers::{ChatProvider, ChatResponse, ProviderResult, Usage};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Settings with a dummy key and the given data directory
    pub fn test_settings(data_dir: &Path, persist: bool) -> Settings {
        Settings {
            api_key: "sk-test".to_string(),
            data_dir: data_dir.to_path_buf(),
            persist,
            ..Default::default()
        }
    }

    /// Answers every request with a numbered reply and keeps the requests
    #[derive(Default, Clone)]
    pub struct StubProvider {
        pub requests: Arc<Mutex<Vec<(String, Vec<ChatMessage>)>>>,
        pub tokens_per_side: i64,
    }

    impl StubProvider {
        pub fn with_tokens(tokens_per_side: i64) -> Self {
            Self {
                tokens_per_side,
                ..Default::default()
            }
        }

        pub fn requests(&self) -> Vec<(String, Vec<ChatMessage>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn chat(
            &self,
            model: &str,
            messages: Vec<ChatMessage>,
        ) -> ProviderResult<ChatResponse> {
            let mut requests = self.requests.lock().unwrap();
            requests.push((model.to_string(), messages));
            Ok(ChatResponse {
                content: format!("reply {}", requests.len()),
                usage: Some(Usage {
                    prompt_tokens: self.tokens_per_side,
                    completion_tokens: self.tokens_per_side,
                    total_tokens: self.tokens_per_side * 2,
                }),
                finish_reason: "stop".to_string(),
                raw_json: "{}".to_string(),
            })
        }

        fn default_model(&self) -> String {
            "stub".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{test_settings, StubProvider};
    use super::*;
    use crate::communicator::testing::ScriptedCommunicator;
    use crate::error::AppError;
    use ai_chatter_core::session::Role;
    use tempfile::TempDir;

    #[test]
    fn test_missing_api_key_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = test_settings(temp_dir.path(), true);
        settings.api_key = "   ".to_string();

        let err = Application::new(settings).err().unwrap();
        assert!(matches!(
            err,
            AppError::Core(ai_chatter_core::Error::MissingApiKey)
        ));
        // Nothing was created before failing
        assert!(!temp_dir.path().join("session.db").exists());
    }

    #[tokio::test]
    async fn test_complete_sends_context_and_records() {
        let temp_dir = TempDir::new().unwrap();
        let provider = StubProvider::default();
        let mut app = Application::new(test_settings(temp_dir.path(), false))
            .unwrap()
            .with_provider(provider.clone())
            .with_communicator(ScriptedCommunicator::default());
        app.session_mut().set_behavior("Be brief.");

        assert_eq!(app.complete("first").await.unwrap(), "reply 1");
        assert_eq!(app.complete("second").await.unwrap(), "reply 2");

        let requests = provider.requests();
        assert_eq!(requests[0].0, "gpt-4");
        let roles: Vec<Role> = requests[1].1.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(requests[1].1[3].content, "second");
        assert_eq!(app.session().prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_complete_persists_each_exchange() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(temp_dir.path(), true);
        let db_path = settings.database_path();
        let mut app = Application::new(settings)
            .unwrap()
            .with_provider(StubProvider::with_tokens(5))
            .with_communicator(ScriptedCommunicator::default());

        app.complete("one").await.unwrap();
        let id = app.session().id().unwrap();
        app.complete("two").await.unwrap();

        let manager = SessionManager::open(&db_path).unwrap();
        let stored = manager.load(id).unwrap().unwrap();
        assert_eq!(stored.prompts().len(), 2);
        assert_eq!(stored.tokens(), 20);
    }

    #[tokio::test]
    async fn test_warns_when_session_grows_too_large() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = test_settings(temp_dir.path(), false);
        settings.session_settings.session_warn_size = 25;
        let communicator = ScriptedCommunicator::default();
        let mut app = Application::new(settings)
            .unwrap()
            .with_provider(StubProvider::with_tokens(10))
            .with_communicator(communicator.clone());

        app.complete("one").await.unwrap();
        assert!(communicator.warnings().is_empty());
        app.complete("two").await.unwrap();
        let warnings = communicator.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("40 tokens"));
    }
}
