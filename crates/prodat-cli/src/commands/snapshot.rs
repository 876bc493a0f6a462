use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use prodat_core::diff::diff_snapshots;
use prodat_core::model::{EntityId, NewSnapshot, ValueMap};
use prodat_core::{ListOptions, ProjectStore};

use crate::output::format::{format_diff, format_snapshot_full, format_snapshot_list, to_json};
use crate::output::OutputFormat;

use super::Global;

#[derive(Subcommand)]
pub enum SnapshotCommand {
    /// Record the current working tree, config and stats
    Create(CreateArgs),
    /// List snapshots (most recent first)
    Ls(LsArgs),
    /// Restore the working tree to a snapshot
    Checkout(CheckoutArgs),
    /// Show a snapshot's record, files and integrity
    Inspect(InspectArgs),
    /// Compare two snapshots
    Diff(DiffArgs),
    /// Delete a snapshot record
    Delete(DeleteArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// Snapshot message
    #[arg(short, long)]
    pub message: String,

    /// Only include these files or directories
    #[arg(long = "path")]
    pub paths: Vec<PathBuf>,

    /// Config value as key=value (value parsed as JSON when possible)
    #[arg(long = "config", value_name = "KEY=VALUE")]
    pub config: Vec<String>,

    /// Stats value as key=value (value parsed as JSON when possible)
    #[arg(long = "stats", value_name = "KEY=VALUE")]
    pub stats: Vec<String>,

    /// JSON file with config values
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// JSON file with stats values
    #[arg(long)]
    pub stats_file: Option<PathBuf>,

    /// Environment ID or prefix (default: the project default)
    #[arg(long)]
    pub environment_id: Option<String>,

    /// Task this snapshot belongs to
    #[arg(long)]
    pub task_id: Option<String>,

    /// Hide from `snapshot ls` unless --all is given
    #[arg(long)]
    pub hidden: bool,
}

#[derive(Args)]
pub struct LsArgs {
    /// Only snapshots from this session (name or ID)
    #[arg(long)]
    pub session: Option<String>,

    /// Include snapshots taken automatically around task runs
    #[arg(long)]
    pub all: bool,

    /// Maximum number of entries
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct CheckoutArgs {
    /// Snapshot ID (full or prefix)
    pub id: String,

    /// Discard unsaved working tree changes
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Snapshot ID (full or prefix)
    pub id: String,
}

#[derive(Args)]
pub struct DiffArgs {
    /// First snapshot ID (or prefix)
    pub id_a: String,

    /// Second snapshot ID (or prefix)
    pub id_b: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Snapshot ID (full or prefix)
    pub id: String,
}

pub fn run(cmd: &SnapshotCommand, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    match cmd {
        SnapshotCommand::Create(args) => create(&store, args, global),
        SnapshotCommand::Ls(args) => ls(&store, args, global.format),
        SnapshotCommand::Checkout(args) => checkout(&store, args, global.format),
        SnapshotCommand::Inspect(args) => {
            let data = store
                .read_snapshot(&args.id)
                .with_context(|| format!("Failed to read snapshot '{}'", args.id))?;
            print!("{}", format_snapshot_full(&data, global.format));
            Ok(())
        }
        SnapshotCommand::Diff(args) => {
            let diff = diff_snapshots(&store, &args.id_a, &args.id_b)
                .context("Failed to compare snapshots")?;
            print!("{}", format_diff(&diff, global.format));
            Ok(())
        }
        SnapshotCommand::Delete(args) => {
            let id = store
                .delete_snapshot(&args.id)
                .with_context(|| format!("Failed to delete snapshot '{}'", args.id))?;
            println!("Deleted snapshot {id}");
            Ok(())
        }
    }
}

fn create(store: &ProjectStore, args: &CreateArgs, global: &Global) -> Result<()> {
    let mut new = NewSnapshot::new(args.message.clone());
    new.paths = project_relative(store, &global.start_dir()?, &args.paths)?;
    new.visible = !args.hidden;
    new.environment_id = args.environment_id.as_deref().map(EntityId::from);
    if let Some(task) = &args.task_id {
        let data = store
            .read_task(task)
            .with_context(|| format!("Unknown task '{task}'"))?;
        new.task_id = Some(data.task.id);
    }

    if let Some(path) = &args.config_file {
        new.config.extend(read_json_map(path)?);
    }
    if let Some(path) = &args.stats_file {
        new.stats.extend(read_json_map(path)?);
    }
    for pair in &args.config {
        let (k, v) = parse_pair(pair)?;
        new.config.insert(k, v);
    }
    for pair in &args.stats {
        let (k, v) = parse_pair(pair)?;
        new.stats.insert(k, v);
    }

    let snapshot = store
        .create_snapshot(new)
        .context("Failed to create snapshot")?;
    match global.format {
        OutputFormat::Json => println!("{}", to_json(&snapshot)),
        OutputFormat::Text => println!("Created snapshot with id: {}", snapshot.id),
    }
    Ok(())
}

/// Resolve paths given relative to the working directory into project-relative ones.
fn project_relative(store: &ProjectStore, start: &Path, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let root = store
        .root()
        .canonicalize()
        .context("Cannot resolve the project root")?;
    paths
        .iter()
        .map(|p| {
            let abs = start
                .join(p)
                .canonicalize()
                .with_context(|| format!("Cannot find {}", p.display()))?;
            abs.strip_prefix(&root)
                .map(Path::to_path_buf)
                .with_context(|| format!("{} is outside the project", p.display()))
        })
        .collect()
}

fn ls(store: &ProjectStore, args: &LsArgs, format: OutputFormat) -> Result<()> {
    let session = match &args.session {
        Some(name) => Some(
            store
                .find_session(name)
                .with_context(|| format!("Unknown session '{name}'"))?
                .id,
        ),
        None => None,
    };
    let opts = ListOptions {
        limit: Some(args.limit),
        session,
        include_hidden: args.all,
    };
    let snapshots = store
        .list_snapshots(&opts)
        .context("Failed to list snapshots")?;
    print!("{}", format_snapshot_list(&snapshots, format));
    Ok(())
}

fn checkout(store: &ProjectStore, args: &CheckoutArgs, format: OutputFormat) -> Result<()> {
    let checkout = store
        .checkout_snapshot(&args.id, args.force)
        .with_context(|| format!("Failed to check out snapshot '{}'", args.id))?;
    match format {
        OutputFormat::Json => println!("{}", to_json(&checkout)),
        OutputFormat::Text if checkout.already_current => {
            println!("Working tree already matches snapshot {}", checkout.snapshot_id.short());
        }
        OutputFormat::Text => println!(
            "Checked out snapshot {}: {} written, {} removed, {} unchanged",
            checkout.snapshot_id.short(),
            checkout.summary.written,
            checkout.summary.removed,
            checkout.summary.unchanged
        ),
    }
    Ok(())
}

fn read_json_map(path: &Path) -> Result<ValueMap> {
    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("{} must hold a JSON object", path.display()))
}

/// `key=value`; the value is JSON when it parses, else a string.
fn parse_pair(pair: &str) -> Result<(String, serde_json::Value)> {
    let (key, raw) = pair
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{pair}'"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Empty key in '{pair}'");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
