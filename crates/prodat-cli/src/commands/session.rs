use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::output::format::format_session_list;

use super::Global;

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Create a session
    Create(NameArgs),
    /// List sessions (* marks the current one)
    Ls,
    /// Make a session current
    Select(NameArgs),
    /// Delete a session (its tasks and snapshots are kept)
    Delete(NameArgs),
}

#[derive(Args)]
pub struct NameArgs {
    /// Session name (or ID for select / delete)
    pub name: String,
}

pub fn run(cmd: &SessionCommand, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    match cmd {
        SessionCommand::Create(args) => {
            let session = store
                .create_session(&args.name)
                .with_context(|| format!("Failed to create session '{}'", args.name))?;
            println!("Created session {} with id: {}", session.name, session.id);
        }
        SessionCommand::Ls => {
            let sessions = store.list_sessions().context("Failed to list sessions")?;
            let current = store.current_session()?;
            print!(
                "{}",
                format_session_list(&sessions, Some(current.id.as_str()), global.format)
            );
        }
        SessionCommand::Select(args) => {
            let session = store
                .select_session(&args.name)
                .with_context(|| format!("Failed to select session '{}'", args.name))?;
            println!("Current session: {}", session.name);
        }
        SessionCommand::Delete(args) => {
            let session = store
                .delete_session(&args.name)
                .with_context(|| format!("Failed to delete session '{}'", args.name))?;
            println!("Deleted session {}", session.name);
        }
    }
    Ok(())
}
