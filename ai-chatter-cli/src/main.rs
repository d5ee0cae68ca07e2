//! CLI entry point for ai-chatter

mod history;

use ai_chatter_apps::{Application, Chatter, Program, ShellHowTo, SummarizePage};
use ai_chatter_core::config::{Settings, SettingsLoader, SettingsOverrides, Verbosity};
use ai_chatter_core::logging::init_logging;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "ai-chatter")]
#[command(about = "Chat with a hosted language model from your terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// API key, overrides config files
    #[arg(short, long, global = true)]
    api_key: Option<String>,

    /// Config file to load on top of the site and user configs [default: ./config.json]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Don't store the session
    #[arg(short, long, global = true)]
    ephemeral: bool,

    /// Also write logs to this file
    #[arg(short, long, global = true)]
    log: Option<PathBuf>,

    /// Increase verbosity (-v warning, -vv info, -vvv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Chat interactively (the default). Enter q or quit to leave.
    Chat,
    /// Ask for a shell command that does what you describe
    Howto {
        /// What the command should do
        #[arg(required = true, trailing_var_arg = true)]
        words: Vec<String>,
    },
    /// Summarize a web page
    Summarize {
        /// The page to summarize (http or https)
        url: String,
    },
    /// Inspect stored sessions
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
enum HistoryCommands {
    /// List stored sessions, newest first
    List,
    /// Show the messages of a session
    Show {
        /// Session id [default: the most recent session]
        id: Option<i64>,
    },
    /// Delete a session and its messages
    Delete {
        /// Session id
        id: i64,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            api_key: self.api_key.clone(),
            ephemeral: self.ephemeral,
            log_file: self.log.clone(),
            verbosity: (self.verbose > 0).then(|| Verbosity::from_count(self.verbose)),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = SettingsLoader::new()
        .load(cli.config.as_deref(), &cli.overrides())
        .context("Failed to load settings")?;

    let _guard = init_logging(settings.verbosity, settings.log_file.as_deref())?;
    debug!("Settings loaded, data dir {}", settings.data_dir.display());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_program(settings, &mut Chatter::new()).await,
        Commands::Howto { words } => run_program(settings, &mut ShellHowTo::new(&words)).await,
        Commands::Summarize { url } => {
            run_program(settings, &mut SummarizePage::new(url)?).await
        }
        Commands::History { command } => match command {
            HistoryCommands::List => history::list(&settings),
            HistoryCommands::Show { id } => history::show(&settings, id),
            HistoryCommands::Delete { id, yes } => history::delete(&settings, id, yes),
        },
    }
}

async fn run_program(settings: Settings, program: &mut dyn Program) -> Result<()> {
    let mut app = Application::new(settings)?;
    app.start(program).await?;
    Ok(())
}
