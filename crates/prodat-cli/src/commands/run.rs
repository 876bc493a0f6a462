use anyhow::{Context, Result};
use clap::Args;
use prodat_core::ListOptions;
use prodat_exec::{RunOptions, RunOutcome};

use crate::output::format::{format_task_full, format_task_list, to_json};
use crate::output::OutputFormat;

use super::Global;

#[derive(Args)]
pub struct RunArgs {
    /// Command to run. A single argument is a shell command line; several
    /// arguments are quoted and run as one command. Options for prodat itself
    /// go before the command, everything after it is passed through.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Environment ID or prefix (default: the project default)
    #[arg(long)]
    pub environment_id: Option<String>,

    /// Do not echo the command's output
    #[arg(long, short)]
    pub quiet: bool,

    /// Port to publish, as host:container (container drivers only)
    #[arg(long = "port", short = 'p')]
    pub ports: Vec<String>,

    /// Memory limit, e.g. 4g (container drivers only)
    #[arg(long)]
    pub mem_limit: Option<String>,
}

#[derive(Args)]
pub struct RerunArgs {
    /// Task ID (full or prefix)
    pub id: String,

    /// Discard unsaved working tree changes
    #[arg(long)]
    pub force: bool,

    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct LsArgs {
    /// Only tasks from this session (name or ID)
    #[arg(long)]
    pub session: Option<String>,

    /// Maximum number of entries
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Task ID (full or prefix)
    pub id: String,

    /// Print the captured output
    #[arg(long)]
    pub output: bool,

    /// List every recorded version of the task, newest first
    #[arg(long, conflicts_with = "output")]
    pub history: bool,
}

#[derive(Args)]
pub struct StopArgs {
    /// Task ID (full or prefix)
    #[arg(long, conflicts_with = "all", required_unless_present = "all")]
    pub id: Option<String>,

    /// Stop every running task
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Task ID (full or prefix)
    pub id: String,
}

pub fn run(args: &RunArgs, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    let runner = global.runner(&store)?;
    let outcome = runner
        .run(RunOptions {
            command: command_line(&args.command),
            environment_id: args.environment_id.clone(),
            quiet: args.quiet,
            ports: args.ports.clone(),
            mem_limit: args.mem_limit.clone(),
            ..Default::default()
        })
        .context("Failed to run task")?;
    report(&outcome, global.format)
}

pub fn rerun(args: &RerunArgs, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    let runner = global.runner(&store)?;
    let outcome = runner
        .rerun(&args.id, args.force, args.quiet)
        .with_context(|| format!("Failed to rerun task '{}'", args.id))?;
    report(&outcome, global.format)
}

/// Summarize a finished task. A failed command makes the process exit non-zero.
pub(crate) fn report(outcome: &RunOutcome, format: OutputFormat) -> Result<()> {
    let task = &outcome.task;
    match format {
        OutputFormat::Json => println!("{}", to_json(task)),
        OutputFormat::Text => {
            println!(
                "Task {} {} (exit code {})",
                task.id.short(),
                task.status,
                task.exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".into())
            );
            if let Some(id) = &task.after_snapshot_id {
                println!("Created snapshot with id: {id}");
            }
        }
    }
    if task.status != prodat_core::model::TaskStatus::Completed {
        anyhow::bail!("Task {} did not complete successfully", task.id.short());
    }
    Ok(())
}

pub fn ls(args: &LsArgs, global: &Global) -> Result<()> {
    let store = global.open_store()?;
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
        include_hidden: false,
    };
    let tasks = store.list_tasks(&opts).context("Failed to list tasks")?;
    print!("{}", format_task_list(&tasks, global.format));
    Ok(())
}

pub fn show(args: &ShowArgs, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    if args.history {
        let versions = store
            .task_history(&args.id)
            .with_context(|| format!("Failed to read history of task '{}'", args.id))?;
        print!("{}", format_task_list(&versions, global.format));
        return Ok(());
    }
    let data = store
        .read_task(&args.id)
        .with_context(|| format!("Failed to read task '{}'", args.id))?;
    if args.output {
        print!("{}", String::from_utf8_lossy(&data.output));
    } else {
        print!("{}", format_task_full(&data, global.format));
    }
    Ok(())
}

pub fn delete(args: &DeleteArgs, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    let task = store
        .delete_task(&args.id)
        .with_context(|| format!("Failed to delete task '{}'", args.id))?;
    match global.format {
        OutputFormat::Json => println!("{}", to_json(&task)),
        OutputFormat::Text => println!("Deleted task {}", task.id),
    }
    Ok(())
}

pub fn stop(args: &StopArgs, global: &Global) -> Result<()> {
    let store = global.open_store()?;
    let runner = global.runner(&store)?;
    let stopped = match &args.id {
        Some(id) => vec![runner
            .stop_task(id)
            .with_context(|| format!("Failed to stop task '{id}'"))?],
        None => runner.stop_all().context("Failed to stop tasks")?,
    };

    match global.format {
        OutputFormat::Json => println!("{}", to_json(&stopped)),
        OutputFormat::Text => {
            if stopped.is_empty() {
                println!("No running tasks.");
            }
            for task in &stopped {
                println!("Stopped task {} ({})", task.id.short(), task.command);
            }
        }
    }
    Ok(())
}

/// Turn the trailing arguments into one shell command line.
fn command_line(args: &[String]) -> String {
    match args {
        [single] => single.clone(),
        _ => args.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" "),
    }
}

#[cfg(not(windows))]
fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(windows)]
fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || "\"&|<>^()".contains(c)) {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\"\""))
    }
}
