//! `history` subcommands: browsing and pruning stored sessions

use ai_chatter_core::config::Settings;
use ai_chatter_core::session::{Session, SessionManager};
use anyhow::{bail, Result};
use chrono::{DateTime, Local, Utc};
use console::style;
use dialoguer::Confirm;

fn open_store(settings: &Settings) -> Result<Option<SessionManager>> {
    let path = settings.database_path();
    if !path.is_file() {
        println!("No sessions stored yet ({} does not exist).", path.display());
        return Ok(None);
    }
    Ok(Some(SessionManager::open(path)?))
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn list(settings: &Settings) -> Result<()> {
    let Some(manager) = open_store(settings)? else {
        return Ok(());
    };
    let sessions = manager.list_sessions()?;
    if sessions.is_empty() {
        println!("No sessions stored yet.");
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "{:>5}  {:<16}  {:<16}  {:>7}  {:>7}",
            "ID", "UPDATED", "MODEL", "PROMPTS", "TOKENS"
        ))
        .bold()
    );
    for info in sessions {
        println!(
            "{:>5}  {:<16}  {:<16}  {:>7}  {:>7}",
            info.id,
            local_time(info.updated_at),
            info.model,
            info.prompt_count,
            info.tokens
        );
    }
    Ok(())
}

pub fn show(settings: &Settings, id: Option<i64>) -> Result<()> {
    let Some(manager) = open_store(settings)? else {
        return Ok(());
    };
    let session = match id {
        Some(id) => manager.load(id)?,
        None => manager.latest()?,
    };
    let Some(session) = session else {
        match id {
            Some(id) => bail!("Session {} not found", id),
            None => bail!("No sessions stored yet"),
        }
    };
    print_session(&session);
    Ok(())
}

fn print_session(session: &Session) {
    println!(
        "{} {}  {}  {}",
        style("Session").bold().cyan(),
        style(session.id().unwrap_or_default()).bold().cyan(),
        session.model,
        style(format!("started {}", local_time(session.created_at()))).dim()
    );
    if let Some(behavior) = session.behavior() {
        println!("{} {}", style("system:").dim(), behavior.content());
    }
    println!();

    for (prompt, response) in session.history() {
        println!("{} {}", style(">").green().bold(), prompt.content());
        match response {
            Some(response) => println!("{}\n", response.content()),
            None => println!("{}\n", style("(no response)").dim()),
        }
    }
    println!(
        "{}",
        style(format!("{} tokens used", session.tokens())).dim()
    );
}

pub fn delete(settings: &Settings, id: i64, yes: bool) -> Result<()> {
    let Some(mut manager) = open_store(settings)? else {
        return Ok(());
    };

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete session {} and all its messages?", id))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    if manager.delete(id)? {
        println!("{}", style(format!("Deleted session {}.", id)).green());
        Ok(())
    } else {
        bail!("Session {} not found", id)
    }
}
