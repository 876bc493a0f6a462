use anyhow::{Context, Result};
use clap::Args;

use super::Global;

#[derive(Args)]
pub struct CleanupArgs {
    /// Confirm removal
    #[arg(long, short)]
    pub yes: bool,
}

pub fn run(args: &CleanupArgs, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    let state_dir = store.state_dir().to_path_buf();

    if !args.yes {
        println!("This removes {} with every snapshot, task and environment record.", state_dir.display());
        eprintln!("Use --yes to confirm.");
        return Ok(());
    }

    let running = store.running_tasks()?;
    if !running.is_empty() {
        anyhow::bail!(
            "{} task(s) still running. Stop them first with `prodat stop --all`.",
            running.len()
        );
    }

    store.destroy().context("Failed to remove project state")?;
    println!("Removed {}. Working files were left untouched.", state_dir.display());
    Ok(())
}
