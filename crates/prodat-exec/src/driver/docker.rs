use std::path::Path;
use std::process::{Command, Stdio};

use prodat_core::model::Environment;
use prodat_core::ProjectStore;

use crate::error::ExecError;
use crate::{TASK_DIR_ENV, TASK_ID_ENV};

use super::{EnvironmentDriver, RunSpec};

/// Where the project root is mounted inside the container.
pub const CONTAINER_ROOT: &str = "/home/project";

/// Builds environments as Docker images and runs commands in throwaway containers.
#[derive(Debug, Clone)]
pub struct DockerDriver {
    pub binary: String,
}

impl Default for DockerDriver {
    fn default() -> Self {
        Self {
            binary: "docker".into(),
        }
    }
}

impl DockerDriver {
    /// Image tag for an environment: `prodat-<first 12 chars of the ID>`.
    pub fn image_tag(environment: &Environment) -> String {
        let id = environment.id.as_str();
        format!("prodat-{}", &id[..12.min(id.len())])
    }

    /// True when the docker CLI answers.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    pub fn build_args(environment: &Environment, context: &Path) -> Vec<String> {
        vec![
            "build".into(),
            "-t".into(),
            Self::image_tag(environment),
            context.display().to_string(),
        ]
    }

    pub fn run_args(spec: &RunSpec) -> Result<Vec<String>, ExecError> {
        let environment = spec.environment.as_ref().ok_or_else(|| {
            ExecError::Driver(
                "the docker driver needs an environment (run `prodat environment setup`)".into(),
            )
        })?;
        let task_dir = spec
            .task_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let mut args: Vec<String> = vec!["run".into(), "--rm".into()];
        if spec.interactive {
            args.push("-it".into());
        }
        args.extend([
            "-v".into(),
            format!("{}:{CONTAINER_ROOT}", spec.root.display()),
            "-w".into(),
            CONTAINER_ROOT.into(),
            "-e".into(),
            format!("{TASK_ID_ENV}={}", spec.task_id),
            "-e".into(),
            format!("{TASK_DIR_ENV}={CONTAINER_ROOT}/{task_dir}"),
        ]);
        for port in &spec.ports {
            args.push("-p".into());
            args.push(port.clone());
        }
        if let Some(limit) = &spec.mem_limit {
            args.push("--memory".into());
            args.push(limit.clone());
        }
        args.extend([
            Self::image_tag(environment),
            "sh".into(),
            "-c".into(),
            spec.command.clone(),
        ]);
        Ok(args)
    }

    fn image_exists(&self, tag: &str) -> bool {
        Command::new(&self.binary)
            .args(["image", "inspect", tag])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }
}

impl EnvironmentDriver for DockerDriver {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn build(&self, store: &ProjectStore, environment: &Environment) -> Result<(), ExecError> {
        let tag = Self::image_tag(environment);
        if self.image_exists(&tag) {
            tracing::debug!(tag, "image already built");
            return Ok(());
        }
        if !environment.files.iter().any(|f| f == "Dockerfile") {
            return Err(ExecError::Driver(format!(
                "environment {} has no Dockerfile",
                environment.id.short()
            )));
        }

        let context = store.state_dir().join("run").join(format!("build-{tag}"));
        store.export_environment(environment.id.as_str(), &context)?;
        tracing::info!(tag, "building image");
        let output = Command::new(&self.binary)
            .args(Self::build_args(environment, &context))
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ExecError::Driver(format!("failed to run {}: {e}", self.binary)));
        let _ = std::fs::remove_dir_all(&context);
        let output = output?;

        if !output.status.success() {
            return Err(ExecError::Driver(format!(
                "docker build failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn command(&self, spec: &RunSpec) -> Result<Command, ExecError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::run_args(spec)?).current_dir(&spec.root);
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodat_core::model::{EntityId, NewEnvironment};
    use std::path::PathBuf;

    fn environment() -> Environment {
        Environment {
            id: EntityId("0123456789abcdef0123".into()),
            name: None,
            description: None,
            created_at: chrono::Utc::now(),
            driver: "docker".into(),
            files: vec!["Dockerfile".into()],
        }
    }

    fn spec(environment: Option<Environment>) -> RunSpec {
        RunSpec {
            command: "python train.py".into(),
            root: PathBuf::from("/work/project"),
            task_id: EntityId("feedbeef".into()),
            task_dir: PathBuf::from(".prodat/run/feedbeef"),
            environment,
            ports: vec!["8888:8888".into()],
            mem_limit: Some("4g".into()),
            interactive: false,
        }
    }

    #[test]
    fn test_image_tag() {
        assert_eq!(DockerDriver::image_tag(&environment()), "prodat-0123456789ab");
    }

    #[test]
    fn test_build_args() {
        let args = DockerDriver::build_args(&environment(), Path::new("/tmp/ctx"));
        assert_eq!(args, vec!["build", "-t", "prodat-0123456789ab", "/tmp/ctx"]);
    }

    #[test]
    fn test_run_args() {
        let args = DockerDriver::run_args(&spec(Some(environment()))).unwrap();
        assert_eq!(&args[..2], &["run", "--rm"]);
        assert!(args.contains(&"/work/project:/home/project".to_string()));
        assert!(args.contains(&"PRODAT_TASK_DIR=/home/project/.prodat/run/feedbeef".to_string()));
        assert!(args.contains(&"PRODAT_TASK_ID=feedbeef".to_string()));
        assert!(args.windows(2).any(|w| w == ["-p", "8888:8888"]));
        assert!(args.windows(2).any(|w| w == ["--memory", "4g"]));
        assert_eq!(
            &args[args.len() - 4..],
            &["prodat-0123456789ab", "sh", "-c", "python train.py"]
        );
    }

    #[test]
    fn test_run_requires_environment() {
        assert!(matches!(
            DockerDriver::run_args(&spec(None)),
            Err(ExecError::Driver(_))
        ));
    }

    #[test]
    fn test_live_build_and_run() {
        let driver = DockerDriver::default();
        if std::env::var_os("PRODAT_SKIP_DOCKER_TESTS").is_some() || !driver.is_available() {
            eprintln!("skipping docker test");
            return;
        }
        let tmp = tempfile::TempDir::new().unwrap();
        let env_dir = tmp.path().join("prodat_environment");
        std::fs::create_dir_all(&env_dir).unwrap();
        std::fs::write(env_dir.join("Dockerfile"), "FROM alpine:3.19\n").unwrap();
        let store = ProjectStore::init(tmp.path(), None, None).unwrap();
        let (environment, _) = store
            .create_environment(&NewEnvironment::default(), "docker")
            .unwrap();
        driver.build(&store, &environment).unwrap();

        let mut run = spec(Some(environment));
        run.command = "echo from-container".into();
        run.root = tmp.path().to_path_buf();
        run.ports.clear();
        run.mem_limit = None;
        let output = driver.command(&run).unwrap().output().unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("from-container"));
    }
}
