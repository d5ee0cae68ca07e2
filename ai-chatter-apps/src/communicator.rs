//! Getting prompts from a user and showing them the responses

use console::{style, Term};
use std::io::{BufRead, BufReader, Write};

use crate::error::AppResult;

/// Words that end an interactive session
const QUIT_WORDS: [&str; 2] = ["q", "quit"];

/// Source of prompts and sink for responses
pub trait Communicator: Send {
    /// Ask for the next prompt. `None` ends the session.
    fn get_prompt(&mut self) -> AppResult<Option<String>>;

    /// Display a response
    fn show_response(&mut self, response: &str) -> AppResult<()>;

    /// Display a warning next to the conversation
    fn show_warning(&mut self, warning: &str) -> AppResult<()>;
}

/// Prompts on the terminal and prints responses to stdout
pub struct CliCommunicator {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
    warnings: Box<dyn Write + Send>,
}

impl CliCommunicator {
    pub fn new() -> Self {
        Self::with_io(
            BufReader::new(std::io::stdin()),
            Term::stdout(),
            Term::stderr(),
        )
    }

    pub fn with_io(
        input: impl BufRead + Send + 'static,
        output: impl Write + Send + 'static,
        warnings: impl Write + Send + 'static,
    ) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
            warnings: Box::new(warnings),
        }
    }
}

impl Default for CliCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for CliCommunicator {
    fn get_prompt(&mut self) -> AppResult<Option<String>> {
        write!(self.output, "> ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            // EOF
            writeln!(self.output)?;
            return Ok(None);
        }

        let prompt = line.trim_end_matches(['\r', '\n']);
        if QUIT_WORDS.contains(&prompt.trim()) {
            return Ok(None);
        }
        Ok(Some(prompt.to_string()))
    }

    fn show_response(&mut self, response: &str) -> AppResult<()> {
        writeln!(self.output, "{}\n", response)?;
        self.output.flush()?;
        Ok(())
    }

    fn show_warning(&mut self, warning: &str) -> AppResult<()> {
        writeln!(self.warnings, "{}", style(warning).yellow())?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned prompts and records everything shown
    #[derive(Default, Clone)]
    pub struct ScriptedCommunicator {
        prompts: Arc<Mutex<VecDeque<String>>>,
        pub responses: Arc<Mutex<Vec<String>>>,
        pub warnings: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedCommunicator {
        pub fn new(prompts: &[&str]) -> Self {
            Self {
                prompts: Arc::new(Mutex::new(
                    prompts.iter().map(|p| p.to_string()).collect(),
                )),
                ..Default::default()
            }
        }

        pub fn responses(&self) -> Vec<String> {
            self.responses.lock().unwrap().clone()
        }

        pub fn warnings(&self) -> Vec<String> {
            self.warnings.lock().unwrap().clone()
        }
    }

    impl Communicator for ScriptedCommunicator {
        fn get_prompt(&mut self) -> AppResult<Option<String>> {
            Ok(self.prompts.lock().unwrap().pop_front())
        }

        fn show_response(&mut self, response: &str) -> AppResult<()> {
            self.responses.lock().unwrap().push(response.to_string());
            Ok(())
        }

        fn show_warning(&mut self, warning: &str) -> AppResult<()> {
            self.warnings.lock().unwrap().push(warning.to_string());
            Ok(())
        }
    }

    /// A `Write` handle whose contents can be inspected after being boxed
    #[derive(Default, Clone)]
    pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
