use std::path::Path;
use std::process::Command;

use chrono::Utc;
use serde::Serialize;

use prodat_core::error::CoreError;
use prodat_core::model::{EntityId, EntityKind, NewSnapshot, Task, TaskStatus, ValueMap};
use prodat_core::{ProjectStore, CONFIG_FILE, STATE_DIR, STATS_FILE};

use crate::capture::{Captured, CapturedProcess};
use crate::driver::{driver_for, EnvironmentDriver, RunSpec};
use crate::error::ExecError;
use crate::process::{is_same_process, start_marker, terminate};

/// What to run and how.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub command: String,
    /// Environment ID or prefix. Falls back to the default / definition directory.
    pub environment_id: Option<String>,
    /// Do not echo the command's output.
    pub quiet: bool,
    pub workspace: Option<String>,
    pub ports: Vec<String>,
    pub mem_limit: Option<String>,
    /// Attach the terminal instead of capturing output.
    pub interactive: bool,
    pub rerun_of: Option<EntityId>,
}

/// A finished task and its captured output.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub task: Task,
    #[serde(skip)]
    pub output: Vec<u8>,
}

/// Runs commands as tracked tasks.
pub struct Runner<'a> {
    store: &'a ProjectStore,
    driver: Box<dyn EnvironmentDriver>,
}

impl<'a> Runner<'a> {
    pub fn new(store: &'a ProjectStore, driver: Box<dyn EnvironmentDriver>) -> Self {
        Self { store, driver }
    }

    /// Use the driver named in the project config.
    pub fn from_config(store: &'a ProjectStore) -> Result<Self, ExecError> {
        let driver = driver_for(&store.config()?.driver)?;
        Ok(Self::new(store, driver))
    }

    pub fn driver(&self) -> &dyn EnvironmentDriver {
        self.driver.as_ref()
    }

    /// Run a command to completion.
    ///
    /// Records a hidden snapshot of the source state, the task itself, and a
    /// visible snapshot holding whatever config and stats the command logged.
    pub fn run(&self, opts: RunOptions) -> Result<RunOutcome, ExecError> {
        if opts.command.trim().is_empty() {
            return Err(ExecError::Spawn("command is empty".into()));
        }
        let session = self.store.current_session()?;
        let environment = self
            .store
            .resolve_environment(opts.environment_id.as_deref(), self.driver.name())?;
        if let Some(environment) = &environment {
            self.driver.build(self.store, environment)?;
        }

        let mut task = Task::new(opts.command.clone(), session.id);
        task.environment_id = environment.as_ref().map(|e| e.id.clone());
        task.workspace = opts.workspace.clone();
        task.rerun_of = opts.rerun_of.clone();

        let spec = RunSpec {
            command: opts.command.clone(),
            root: self.store.root().to_path_buf(),
            task_id: task.id.clone(),
            task_dir: Path::new(STATE_DIR).join("run").join(task.id.as_str()),
            environment,
            ports: opts.ports.clone(),
            mem_limit: opts.mem_limit.clone(),
            interactive: opts.interactive,
        };
        let cmd = self.driver.command(&spec)?;

        let mut before = NewSnapshot::new(format!("Source state of task {}", task.id.short()));
        before.visible = false;
        before.task_id = Some(task.id.clone());
        before.environment_id = task.environment_id.clone();
        task.before_snapshot_id = Some(self.store.create_snapshot(before)?.id);

        let task_dir = self.store.task_dir(&task.id);
        std::fs::create_dir_all(&task_dir)?;
        task.started_at = Some(Utc::now());
        let result = match self.store.create_task(&task) {
            Ok(()) => self.execute(&task.id, cmd, &task_dir, &opts),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = std::fs::remove_dir_all(&task_dir) {
            tracing::debug!("could not remove {}: {e}", task_dir.display());
        }
        result
    }

    /// Spawn, wait and record the result. Any failure after the task record
    /// exists marks it failed.
    fn execute(
        &self,
        id: &EntityId,
        cmd: Command,
        task_dir: &Path,
        opts: &RunOptions,
    ) -> Result<RunOutcome, ExecError> {
        let process = match CapturedProcess::spawn(cmd, opts.quiet, opts.interactive) {
            Ok(process) => process,
            Err(e) => {
                self.mark_failed(id, None, e.to_string().as_bytes())?;
                return Err(e);
            }
        };
        let pid = process.pid();
        let pid_started = start_marker(pid);
        let task = self.store.update_task_with::<_, CoreError>(id.as_str(), None, |t| {
            t.pid = Some(pid);
            t.pid_started = pid_started;
            Ok(())
        })?;
        tracing::info!(id = %task.id, pid, command = %task.command, "task started");

        let captured = match process.wait() {
            Ok(captured) => captured,
            Err(e) => {
                self.mark_failed(id, None, e.to_string().as_bytes())?;
                return Err(e);
            }
        };
        match self.finish(&task, task_dir, &captured) {
            Ok(task) => Ok(RunOutcome {
                task,
                output: captured.output,
            }),
            Err(e) => {
                self.mark_failed(id, captured.exit_code, &captured.output)?;
                Err(e)
            }
        }
    }

    fn finish(&self, task: &Task, task_dir: &Path, captured: &Captured) -> Result<Task, ExecError> {
        let mut after = NewSnapshot::new(format!("Task {}: {}", task.id.short(), task.command));
        after.config = read_value_file(&task_dir.join(CONFIG_FILE))?;
        after.stats = read_value_file(&task_dir.join(STATS_FILE))?;
        after.task_id = Some(task.id.clone());
        after.environment_id = task.environment_id.clone();
        let after = self.store.create_snapshot(after)?;

        // Applied to the stored record so a stop made during the run survives.
        let task = self.store.update_task_with::<_, CoreError>(
            task.id.as_str(),
            Some(&captured.output),
            |t| {
                t.after_snapshot_id = Some(after.id);
                t.exit_code = captured.exit_code;
                t.ended_at = Some(Utc::now());
                t.status = if !t.stopped && captured.exit_code == Some(0) {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Failed
                };
                Ok(())
            },
        )?;
        tracing::info!(id = %task.id, status = %task.status, exit_code = ?task.exit_code, "task finished");
        Ok(task)
    }

    fn mark_failed(&self, id: &EntityId, exit_code: Option<i32>, output: &[u8]) -> Result<(), ExecError> {
        self.store
            .update_task_with::<_, CoreError>(id.as_str(), Some(output), |t| {
                t.status = TaskStatus::Failed;
                t.exit_code = exit_code.or(t.exit_code);
                t.ended_at = Some(Utc::now());
                Ok(())
            })?;
        tracing::warn!(id = %id, "task failed before it could be finalized");
        Ok(())
    }

    /// Restore a task's source snapshot and run its command again.
    pub fn rerun(&self, task_id: &str, force: bool, quiet: bool) -> Result<RunOutcome, ExecError> {
        let original = self.store.read_task(task_id)?.task;
        let source = original.before_snapshot_id.as_ref().ok_or_else(|| {
            ExecError::Core(CoreError::NotFound {
                kind: EntityKind::Snapshot,
                id: format!("source of task {}", original.id.short()),
            })
        })?;
        let checkout = self.store.checkout_snapshot(source.as_str(), force)?;
        tracing::info!(
            task = %original.id,
            snapshot = %checkout.snapshot_id,
            written = checkout.summary.written,
            "restored source state"
        );

        self.run(RunOptions {
            command: original.command.clone(),
            environment_id: original.environment_id.as_ref().map(|id| id.to_string()),
            quiet,
            workspace: original.workspace.clone(),
            rerun_of: Some(original.id.clone()),
            ..Default::default()
        })
    }

    /// Mark a running task failed and stopped, then signal its process.
    ///
    /// The process is only signalled while its pid still belongs to the
    /// process the task started. A task left running by a crashed prodat is
    /// just marked.
    pub fn stop_task(&self, task_id: &str) -> Result<Task, ExecError> {
        let task = self.store.update_task_with(task_id, None, |t| {
            if t.status != TaskStatus::Running {
                return Err(ExecError::NotRunning(t.id.to_string()));
            }
            t.stopped = true;
            t.status = TaskStatus::Failed;
            t.ended_at = Some(Utc::now());
            Ok(())
        })?;

        if let Some(pid) = task.pid {
            if is_same_process(pid, task.pid_started.as_deref()) {
                if let Err(e) = terminate(pid) {
                    tracing::warn!(id = %task.id, pid, "could not signal task: {e}");
                }
            } else {
                tracing::warn!(id = %task.id, pid, "process is gone or its pid was reused, not signalling");
            }
        }
        tracing::info!(id = %task.id, "task stopped");
        Ok(task)
    }

    /// Stop every running task. Tasks that finish meanwhile are skipped.
    pub fn stop_all(&self) -> Result<Vec<Task>, ExecError> {
        let mut stopped = Vec::new();
        for task in self.store.running_tasks()? {
            match self.stop_task(task.id.as_str()) {
                Ok(task) => stopped.push(task),
                Err(ExecError::NotRunning(id)) => tracing::debug!(id = %id, "task already finished"),
                Err(e) => return Err(e),
            }
        }
        Ok(stopped)
    }
}

/// Missing file means nothing was logged.
fn read_value_file(path: &Path) -> Result<ValueMap, ExecError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ValueMap::new()),
        Err(e) => Err(ExecError::Io(e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::driver::LocalDriver;
    use prodat_core::ListOptions;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ProjectStore) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("train.py"), "lr = 0.1\n").unwrap();
        let store = ProjectStore::init(tmp.path(), None, None).unwrap();
        (tmp, store)
    }

    fn run(store: &ProjectStore, command: &str) -> RunOutcome {
        Runner::new(store, Box::new(LocalDriver))
            .run(RunOptions {
                command: command.into(),
                quiet: true,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_run_records_everything() {
        let (_tmp, store) = setup();
        let outcome = run(
            &store,
            r#"echo training; printf '{"lr": 0.1}' > "$PRODAT_TASK_DIR/config.json"; printf '{"accuracy": 0.91}' > "$PRODAT_TASK_DIR/stats.json""#,
        );

        let task = &outcome.task;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.exit_code, Some(0));
        assert!(task.pid.is_some());
        assert!(task.ended_at.is_some());
        assert!(String::from_utf8_lossy(&outcome.output).contains("training"));

        let stored = store.read_task(task.id.as_str()).unwrap();
        assert_eq!(stored.task, *task);
        assert_eq!(stored.output, outcome.output);

        let before = store
            .read_snapshot(task.before_snapshot_id.as_ref().unwrap().as_str())
            .unwrap();
        assert!(!before.snapshot.visible);
        let after = store
            .read_snapshot(task.after_snapshot_id.as_ref().unwrap().as_str())
            .unwrap();
        assert!(after.snapshot.visible);
        assert_eq!(after.snapshot.task_id.as_ref(), Some(&task.id));
        assert_eq!(after.snapshot.config["lr"], serde_json::json!(0.1));
        assert_eq!(after.snapshot.stats["accuracy"], serde_json::json!(0.91));

        // Only the "after" snapshot is listed by default
        assert_eq!(store.list_snapshots(&ListOptions::default()).unwrap().len(), 1);
        // Scratch directory is gone
        assert!(!store.task_dir(&task.id).exists());
    }

    #[test]
    fn test_failed_command() {
        let (_tmp, store) = setup();
        let outcome = run(&store, "echo oops 1>&2; exit 2");
        assert_eq!(outcome.task.status, TaskStatus::Failed);
        assert_eq!(outcome.task.exit_code, Some(2));
        assert!(String::from_utf8_lossy(&outcome.output).contains("oops"));
    }

    #[test]
    fn test_invalid_stats_file() {
        let (_tmp, store) = setup();
        let result = Runner::new(&store, Box::new(LocalDriver)).run(RunOptions {
            command: r#"echo '[1, 2]' > "$PRODAT_TASK_DIR/stats.json""#.into(),
            quiet: true,
            ..Default::default()
        });
        assert!(matches!(result, Err(ExecError::Json(_))));

        let tasks = store.list_tasks(&ListOptions::default()).unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Failed);
        assert_eq!(tasks[0].exit_code, Some(0));
        assert!(!store.task_dir(&tasks[0].id).exists());
    }

    struct BrokenDriver;

    impl EnvironmentDriver for BrokenDriver {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn build(&self, _: &ProjectStore, _: &prodat_core::model::Environment) -> Result<(), ExecError> {
            Ok(())
        }

        fn command(&self, _: &RunSpec) -> Result<Command, ExecError> {
            Err(ExecError::Driver("no image".into()))
        }
    }

    #[test]
    fn test_driver_failure_leaves_nothing_behind() {
        let (_tmp, store) = setup();
        let result = Runner::new(&store, Box::new(BrokenDriver)).run(RunOptions {
            command: "true".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ExecError::Driver(_))));

        let all = ListOptions {
            include_hidden: true,
            ..Default::default()
        };
        assert!(store.list_snapshots(&all).unwrap().is_empty());
        assert!(store.list_tasks(&all).unwrap().is_empty());
    }

    #[test]
    fn test_finish_keeps_concurrent_stop() {
        let (tmp, store) = setup();
        let runner = Runner::new(&store, Box::new(LocalDriver));
        let task = Task::new("sleep 5", store.current_session().unwrap().id);
        store.create_task(&task).unwrap();

        runner.stop_task(task.id.as_str()).unwrap();
        let captured = Captured {
            exit_code: Some(0),
            output: b"done\n".to_vec(),
        };
        let finished = runner.finish(&task, tmp.path(), &captured).unwrap();
        assert!(finished.stopped);
        assert_eq!(finished.status, TaskStatus::Failed);
        assert!(finished.after_snapshot_id.is_some());
        assert_eq!(store.read_task(task.id.as_str()).unwrap().output, b"done\n");
    }

    #[test]
    fn test_rerun_restores_source_state() {
        let (tmp, store) = setup();
        let first = run(&store, "cat train.py");

        std::fs::write(tmp.path().join("train.py"), "lr = 0.5\n").unwrap();
        std::fs::write(tmp.path().join("scratch.py"), "x = 1\n").unwrap();
        store
            .create_snapshot(NewSnapshot::new("tweak learning rate"))
            .unwrap();

        let runner = Runner::new(&store, Box::new(LocalDriver));
        let second = runner.rerun(first.task.id.as_str(), false, true).unwrap();
        assert_eq!(second.task.rerun_of.as_ref(), Some(&first.task.id));
        assert_eq!(second.task.command, "cat train.py");
        assert!(String::from_utf8_lossy(&second.output).contains("lr = 0.1"));
        assert!(!tmp.path().join("scratch.py").exists());
    }

    #[test]
    fn test_rerun_refuses_unsaved_changes() {
        let (tmp, store) = setup();
        let first = run(&store, "true");
        std::fs::write(tmp.path().join("train.py"), "unsaved edit\n").unwrap();

        let runner = Runner::new(&store, Box::new(LocalDriver));
        assert!(matches!(
            runner.rerun(first.task.id.as_str(), false, true),
            Err(ExecError::Core(CoreError::UnsavedChanges))
        ));
    }

    #[test]
    fn test_stop_running_task() {
        let (_tmp, store) = setup();
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();

        let mut task = Task::new("sleep 30", store.current_session().unwrap().id);
        task.pid = Some(child.id());
        task.pid_started = start_marker(child.id());
        store.create_task(&task).unwrap();

        let runner = Runner::new(&store, Box::new(LocalDriver));
        let stopped = runner.stop_all().unwrap();
        assert_eq!(stopped.len(), 1);
        assert!(stopped[0].stopped);
        assert_eq!(stopped[0].status, TaskStatus::Failed);
        assert!(!child.wait().unwrap().success());

        assert!(matches!(
            runner.stop_task(task.id.as_str()),
            Err(ExecError::NotRunning(_))
        ));
        assert!(runner.stop_all().unwrap().is_empty());
    }

    #[test]
    fn test_stop_does_not_signal_reused_pid() {
        let (_tmp, store) = setup();
        let mut unrelated = Command::new("sleep").arg("30").spawn().unwrap();

        let mut task = Task::new("python train.py", store.current_session().unwrap().id);
        task.pid = Some(unrelated.id());
        task.pid_started = Some("Thu Jan  1 00:00:00 1970".into());
        store.create_task(&task).unwrap();

        let runner = Runner::new(&store, Box::new(LocalDriver));
        let stopped = runner.stop_all().unwrap();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].status, TaskStatus::Failed);
        assert!(unrelated.try_wait().unwrap().is_none());

        unrelated.kill().unwrap();
        unrelated.wait().unwrap();
    }
}
