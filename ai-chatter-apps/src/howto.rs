//! One-shot shell command suggestions

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::application::{Application, Program};
use crate::error::AppResult;

const OS_RELEASE: &str = "/etc/os-release";

/// What the model needs to know to suggest runnable commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvData {
    pub platform: String,
    pub shell: String,
}

impl EnvData {
    /// Inspect the current machine
    pub fn detect() -> Self {
        Self {
            platform: detect_platform(),
            shell: detect_shell(),
        }
    }

    fn directive(&self) -> String {
        format!(
            "Only return a shell command, or a series of commands delineated by newlines. \
             Don't give explanations or further information. The commands should be runnable directly.\n\
             I'm running a {} system with the {} shell.",
            self.platform, self.shell
        )
    }
}

/// Ask for a shell command that does what the words describe
#[derive(Debug)]
pub struct ShellHowTo {
    prompt: String,
    env: EnvData,
}

impl ShellHowTo {
    pub fn new<S: AsRef<str>>(words: &[S]) -> Self {
        Self::with_env(words, EnvData::detect())
    }

    pub fn with_env<S: AsRef<str>>(words: &[S], env: EnvData) -> Self {
        let prompt = words
            .iter()
            .map(|w| w.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        Self { prompt, env }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

#[async_trait]
impl Program for ShellHowTo {
    fn name(&self) -> &'static str {
        "ShellHowTo"
    }

    async fn run(&mut self, app: &mut Application) -> AppResult<()> {
        debug!("Environment: {:?}", self.env);
        app.session_mut().set_behavior(self.env.directive());
        let response = app.complete(&self.prompt).await?;
        app.communicator().show_response(&response)?;
        Ok(())
    }
}

/// `PRETTY_NAME` from the contents of an os-release file
pub fn parse_os_release(contents: &str) -> Option<String> {
    const PREFIX: &str = "PRETTY_NAME=";
    contents
        .lines()
        .find(|line| line.to_ascii_uppercase().starts_with(PREFIX))
        .map(|line| {
            line[PREFIX.len()..]
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string()
        })
        .filter(|name| !name.is_empty())
}

fn os_name() -> String {
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "macos" => "macOS".to_string(),
        "windows" => "Windows".to_string(),
        "freebsd" => "FreeBSD".to_string(),
        "openbsd" => "OpenBSD".to_string(),
        "netbsd" => "NetBSD".to_string(),
        other => other.to_string(),
    }
}

fn detect_platform() -> String {
    if cfg!(any(
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    )) {
        if let Ok(contents) = std::fs::read_to_string(OS_RELEASE) {
            if let Some(name) = parse_os_release(&contents) {
                return name;
            }
        }
    }
    os_name()
}

fn detect_shell() -> String {
    if cfg!(windows) {
        // PSModulePath is only set inside PowerShell sessions
        if std::env::var_os("PSModulePath").is_some() {
            return "PowerShell".to_string();
        }
        return std::env::var("COMSPEC")
            .ok()
            .and_then(|path| shell_name(&path))
            .unwrap_or_else(|| "cmd.exe".to_string());
    }
    std::env::var("SHELL")
        .ok()
        .and_then(|path| shell_name(&path))
        .unwrap_or_else(|| "sh".to_string())
}

fn shell_name(path: &str) -> Option<String> {
    Path::new(path.trim())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}
