//! Environment drivers: build an environment and wrap a command to run in it.

mod docker;
mod local;

use std::path::PathBuf;
use std::process::Command;

use prodat_core::model::{EntityId, Environment};
use prodat_core::ProjectStore;

use crate::error::ExecError;

pub use docker::DockerDriver;
pub use local::LocalDriver;

/// Everything a driver needs to build the process for one task.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub command: String,
    /// Project root; the command's working directory.
    pub root: PathBuf,
    pub task_id: EntityId,
    /// Task scratch directory, relative to the project root.
    pub task_dir: PathBuf,
    pub environment: Option<Environment>,
    /// Ports to publish (`host:container`), used by container drivers.
    pub ports: Vec<String>,
    /// Memory limit understood by the driver, e.g. "4g".
    pub mem_limit: Option<String>,
    pub interactive: bool,
}

pub trait EnvironmentDriver {
    fn name(&self) -> &'static str;

    /// Make the environment ready to run commands. May be slow.
    fn build(&self, store: &ProjectStore, environment: &Environment) -> Result<(), ExecError>;

    /// The process to spawn for a task. Stdio is configured by the caller.
    fn command(&self, spec: &RunSpec) -> Result<Command, ExecError>;
}

/// Look a driver up by its configured name.
pub fn driver_for(name: &str) -> Result<Box<dyn EnvironmentDriver>, ExecError> {
    match name {
        "local" => Ok(Box::new(LocalDriver)),
        "docker" => Ok(Box::new(DockerDriver::default())),
        other => Err(ExecError::Driver(format!(
            "unknown driver '{other}' (expected local or docker)"
        ))),
    }
}

/// `sh -c <command>` on Unix, `cmd /C <command>` on Windows.
pub(crate) fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}
