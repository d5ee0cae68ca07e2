//! Interactive chat on the command line

use async_trait::async_trait;
use tracing::debug;

use crate::application::{Application, Program};
use crate::error::AppResult;

/// A simple chatbot: prompt, answer, repeat until the user quits
#[derive(Debug, Default)]
pub struct Chatter;

impl Chatter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Program for Chatter {
    fn name(&self) -> &'static str {
        "Chatter"
    }

    async fn run(&mut self, app: &mut Application) -> AppResult<()> {
        while let Some(prompt) = app.communicator().get_prompt()? {
            if prompt.trim().is_empty() {
                continue;
            }
            let response = app.complete(&prompt).await?;
            app.communicator().show_response(&response)?;
        }
        debug!("Chat ended after {} prompts", app.session().prompts().len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{test_settings, StubProvider};
    use crate::communicator::testing::ScriptedCommunicator;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_chat_loop_answers_until_prompts_run_out() {
        let temp_dir = TempDir::new().unwrap();
        let communicator = ScriptedCommunicator::new(&["hello", "   ", "how are you?"]);
        let provider = StubProvider::default();
        let mut app = Application::new(test_settings(temp_dir.path(), false))
            .unwrap()
            .with_provider(provider.clone())
            .with_communicator(communicator.clone());

        app.start(&mut Chatter::new()).await.unwrap();

        assert_eq!(communicator.responses(), vec!["reply 1", "reply 2"]);
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(app.session().prompts()[1].content(), "how are you?");
    }

    #[tokio::test]
    async fn test_start_saves_session() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(temp_dir.path(), true);
        let db_path = settings.database_path();
        let mut app = Application::new(settings)
            .unwrap()
            .with_provider(StubProvider::default())
            .with_communicator(ScriptedCommunicator::new(&["hi"]));

        app.start(&mut Chatter::new()).await.unwrap();

        let manager = ai_chatter_core::session::SessionManager::open(db_path).unwrap();
        let sessions = manager.list_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].prompt_count, 1);
    }
}
