use anyhow::{Context, Result};
use clap::Args;
use prodat_core::ProjectStore;

use super::Global;

#[derive(Args)]
pub struct InitArgs {
    /// Project name (default: the directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Project description
    #[arg(long)]
    pub description: Option<String>,

    /// Remove existing project state and start over
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, global: &Global) -> Result<()> {
    let root = global.start_dir()?;
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Cannot create {}", root.display()))?;

    if ProjectStore::is_initialized(&root) {
        if !args.force {
            println!("A prodat project already exists in {}.", root.display());
            println!("Use --force to re-initialize.");
            return Ok(());
        }
        ProjectStore::open(&root)?
            .destroy()
            .context("Failed to remove existing project state")?;
    }

    println!("Initializing project in {}", root.display());
    let name = args.name.clone().or_else(|| {
        root.canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    });
    let store = ProjectStore::init(&root, name, args.description.clone())
        .context("Failed to initialize project")?;
    let settings = store.config()?;

    println!(
        "Project '{}' is ready.",
        settings.name.as_deref().unwrap_or("unnamed")
    );
    println!();
    println!("Next steps:");
    println!("  prodat environment setup          Write an environment definition");
    println!("  prodat snapshot create -m <msg>   Record the current state");
    println!("  prodat run \"<command>\"            Run and track an experiment");
    Ok(())
}
