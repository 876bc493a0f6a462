use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "prodat",
    version,
    about = "Track experiments, environments and snapshots of ML projects"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    /// Project directory (default: the current directory)
    #[arg(long, global = true, env = "PRODAT_HOME")]
    home: Option<PathBuf>,

    /// Environment driver, overriding the project config (local or docker)
    #[arg(long, global = true, env = "PRODAT_DRIVER")]
    driver: Option<String>,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let global = commands::Global {
        format: cli.format,
        home: cli.home,
        driver: cli.driver,
    };

    match &cli.command {
        commands::Commands::Init(args) => commands::init::run(args, &global),
        commands::Commands::Run(args) => commands::run::run(args, &global),
        commands::Commands::Rerun(args) => commands::run::rerun(args, &global),
        commands::Commands::Ls(args) => commands::run::ls(args, &global),
        commands::Commands::Show(args) => commands::run::show(args, &global),
        commands::Commands::Stop(args) => commands::run::stop(args, &global),
        commands::Commands::Delete(args) => commands::run::delete(args, &global),
        commands::Commands::Snapshot(cmd) => commands::snapshot::run(cmd, &global),
        commands::Commands::Environment(cmd) => commands::environment::run(cmd, &global),
        commands::Commands::Session(cmd) => commands::session::run(cmd, &global),
        commands::Commands::Notebook(args) => {
            commands::workspace::run(prodat_exec::Workspace::Notebook, args, &global)
        }
        commands::Commands::Jupyterlab(args) => {
            commands::workspace::run(prodat_exec::Workspace::JupyterLab, args, &global)
        }
        commands::Commands::Rstudio(args) => {
            commands::workspace::run(prodat_exec::Workspace::RStudio, args, &global)
        }
        commands::Commands::Terminal(args) => {
            commands::workspace::run(prodat_exec::Workspace::Terminal, args, &global)
        }
        commands::Commands::Status => commands::status::run(&global),
        commands::Commands::Cleanup(args) => commands::cleanup::run(args, &global),
        commands::Commands::Version => commands::version::run(),
    }
}
