pub mod cleanup;
pub mod environment;
pub mod init;
pub mod run;
pub mod session;
pub mod snapshot;
pub mod status;
pub mod version;
pub mod workspace;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use prodat_core::ProjectStore;
use prodat_exec::{driver_for, Runner};

use crate::output::OutputFormat;

/// Flags shared by every command.
pub struct Global {
    pub format: OutputFormat,
    pub home: Option<PathBuf>,
    pub driver: Option<String>,
}

impl Global {
    /// Directory the command works from.
    pub fn start_dir(&self) -> Result<PathBuf> {
        match &self.home {
            Some(home) => Ok(home.clone()),
            None => std::env::current_dir().context("Cannot read the current directory"),
        }
    }

    /// Open the project containing the start directory.
    pub fn open_store(&self) -> Result<ProjectStore> {
        let start = self.start_dir()?;
        let store = ProjectStore::discover(&start).with_context(|| {
            format!(
                "No prodat project at or above {}. Run `prodat init` first.",
                start.display()
            )
        })?;
        tracing::debug!(root = %store.root().display(), "opened project");
        Ok(store)
    }

    /// Driver name from the flag / env, falling back to the project config.
    pub fn driver_name(&self, store: &ProjectStore) -> Result<String> {
        match &self.driver {
            Some(name) => Ok(name.clone()),
            None => Ok(store.config().context("Failed to read project config")?.driver),
        }
    }

    /// Runner for the `--driver` override, else the project's configured driver.
    pub fn runner<'a>(&self, store: &'a ProjectStore) -> Result<Runner<'a>> {
        let runner = match &self.driver {
            Some(name) => Runner::new(store, driver_for(name)?),
            None => Runner::from_config(store)?,
        };
        Ok(runner)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a project in the current directory
    Init(init::InitArgs),
    /// Run a command as a tracked task
    Run(run::RunArgs),
    /// Restore a task's source state and run it again
    Rerun(run::RerunArgs),
    /// List tasks (most recent first)
    Ls(run::LsArgs),
    /// Show details of a task
    Show(run::ShowArgs),
    /// Stop running tasks
    Stop(run::StopArgs),
    /// Delete a finished task's record
    Delete(run::DeleteArgs),
    /// Create, list, inspect and restore snapshots
    #[command(subcommand)]
    Snapshot(snapshot::SnapshotCommand),
    /// Set up and manage environments
    #[command(subcommand, alias = "env")]
    Environment(environment::EnvironmentCommand),
    /// Manage sessions
    #[command(subcommand)]
    Session(session::SessionCommand),
    /// Start a Jupyter Notebook as a task
    Notebook(workspace::WorkspaceArgs),
    /// Start JupyterLab as a task
    Jupyterlab(workspace::WorkspaceArgs),
    /// Start RStudio Server as a task
    Rstudio(workspace::WorkspaceArgs),
    /// Open an interactive shell as a task
    Terminal(workspace::WorkspaceArgs),
    /// Show project status
    Status,
    /// Remove the project's .prodat directory
    Cleanup(cleanup::CleanupArgs),
    /// Print version information
    Version,
}
