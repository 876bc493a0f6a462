use std::process::Command;

use prodat_core::model::Environment;
use prodat_core::ProjectStore;

use crate::error::ExecError;
use crate::{TASK_DIR_ENV, TASK_ID_ENV};

use super::{shell_command, EnvironmentDriver, RunSpec};

/// Runs commands directly on the host. Environments are recorded, never built.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDriver;

impl EnvironmentDriver for LocalDriver {
    fn name(&self) -> &'static str {
        "local"
    }

    fn build(&self, _store: &ProjectStore, environment: &Environment) -> Result<(), ExecError> {
        tracing::debug!(id = %environment.id, "local driver: nothing to build");
        Ok(())
    }

    fn command(&self, spec: &RunSpec) -> Result<Command, ExecError> {
        let mut cmd = shell_command(&spec.command);
        cmd.current_dir(&spec.root)
            .env(TASK_ID_ENV, spec.task_id.as_str())
            .env(TASK_DIR_ENV, spec.root.join(&spec.task_dir));
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodat_core::model::EntityId;
    use std::path::PathBuf;

    #[test]
    fn test_local_command() {
        let spec = RunSpec {
            command: "python train.py --epochs 3".into(),
            root: PathBuf::from("/work/project"),
            task_id: EntityId("abc123".into()),
            task_dir: PathBuf::from(".prodat/run/abc123"),
            environment: None,
            ports: Vec::new(),
            mem_limit: None,
            interactive: false,
        };
        let cmd = LocalDriver.command(&spec).unwrap();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args.last().map(String::as_str), Some("python train.py --epochs 3"));
        assert_eq!(cmd.get_current_dir(), Some(spec.root.as_path()));

        let envs: Vec<_> = cmd
            .get_envs()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.map(|v| v.to_string_lossy().into_owned())))
            .collect();
        assert!(envs.contains(&(TASK_ID_ENV.to_string(), Some("abc123".to_string()))));
        assert!(envs.iter().any(|(k, v)| k == TASK_DIR_ENV
            && v.as_deref().is_some_and(|v| v.ends_with("abc123"))));
    }
}
