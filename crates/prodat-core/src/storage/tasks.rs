use crate::error::CoreError;
use crate::model::{EntityKind, Task, TaskData, TaskStatus};

use super::git_backend::{ListOptions, ProjectStore};
use super::objects::{write_record, RecordEntry, OUTPUT_LOG};
use super::read::{read_manifest, read_optional_blob, record_tree};
use super::refs::{create_entity_ref, delete_entity_ref, find_entity_ref};

impl ProjectStore {
    /// Store a new task record.
    pub fn create_task(&self, task: &Task) -> Result<(), CoreError> {
        let _lock = self.lock()?;
        let commit = write_record(self.repo(), EntityKind::Task, &task.id, task, Vec::new(), None)?;
        create_entity_ref(self.repo(), EntityKind::Task, &task.id, commit)?;
        tracing::info!(id = %task.id, command = %task.command, "created task");
        Ok(())
    }

    /// Write a new version of a task on top of the previous one.
    ///
    /// With `output` set the log is replaced; otherwise the previous log is kept.
    pub fn update_task(&self, task: &Task, output: Option<&[u8]>) -> Result<(), CoreError> {
        let _lock = self.lock()?;
        self.update_task_unlocked(task, output)
    }

    /// Re-read a task under the lock, let `change` edit it, and store the result.
    ///
    /// The edit always applies to the latest stored version, so concurrent
    /// writers never overwrite each other's fields. An error from `change`
    /// leaves the record untouched.
    pub fn update_task_with<F, E>(
        &self,
        id_or_prefix: &str,
        output: Option<&[u8]>,
        change: F,
    ) -> Result<Task, E>
    where
        F: FnOnce(&mut Task) -> Result<(), E>,
        E: From<CoreError>,
    {
        let _lock = self.lock()?;
        let (_, oid) = self.resolve_ref(EntityKind::Task, id_or_prefix)?;
        let mut task: Task = read_manifest(self.repo(), oid)?;
        change(&mut task)?;
        self.update_task_unlocked(&task, output)?;
        Ok(task)
    }

    fn update_task_unlocked(&self, task: &Task, output: Option<&[u8]>) -> Result<(), CoreError> {
        let parent = find_entity_ref(self.repo(), EntityKind::Task, &task.id).ok_or_else(|| {
            CoreError::NotFound {
                kind: EntityKind::Task,
                id: task.id.to_string(),
            }
        })?;

        let log = match output {
            Some(bytes) => Some(bytes.to_vec()),
            None => {
                let tree = record_tree(self.repo(), parent)?;
                read_optional_blob(self.repo(), &tree, OUTPUT_LOG)?
            }
        };
        let entries = log
            .map(|bytes| vec![(OUTPUT_LOG, RecordEntry::Blob(bytes))])
            .unwrap_or_default();

        let commit = write_record(self.repo(), EntityKind::Task, &task.id, task, entries, Some(parent))?;
        create_entity_ref(self.repo(), EntityKind::Task, &task.id, commit)?;
        tracing::debug!(id = %task.id, status = %task.status, "updated task");
        Ok(())
    }

    /// Read the latest version of a task and its output log.
    pub fn read_task(&self, id_or_prefix: &str) -> Result<TaskData, CoreError> {
        let (_, oid) = self.resolve_ref(EntityKind::Task, id_or_prefix)?;
        let task = read_manifest(self.repo(), oid)?;
        let tree = record_tree(self.repo(), oid)?;
        let output = read_optional_blob(self.repo(), &tree, OUTPUT_LOG)?.unwrap_or_default();
        Ok(TaskData { task, output })
    }

    /// Every stored version of a task, latest first.
    pub fn task_history(&self, id_or_prefix: &str) -> Result<Vec<Task>, CoreError> {
        let (_, oid) = self.resolve_ref(EntityKind::Task, id_or_prefix)?;
        let mut versions = Vec::new();
        let mut next = Some(self.repo().find_commit(oid)?);
        while let Some(commit) = next {
            versions.push(read_manifest(self.repo(), commit.id())?);
            next = commit.parents().next();
        }
        Ok(versions)
    }

    /// List tasks, newest first.
    pub fn list_tasks(&self, opts: &ListOptions) -> Result<Vec<Task>, CoreError> {
        let mut tasks: Vec<Task> = self
            .read_all(EntityKind::Task, |t: &Task| t.created_at)?
            .into_iter()
            .filter(|t| opts.session.as_ref().map_or(true, |id| &t.session_id == id))
            .collect();
        if let Some(limit) = opts.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    /// Delete a finished task's record and its scratch directory.
    /// Snapshots taken around the task are kept.
    pub fn delete_task(&self, id_or_prefix: &str) -> Result<Task, CoreError> {
        let _lock = self.lock()?;
        let (id, oid) = self.resolve_ref(EntityKind::Task, id_or_prefix)?;
        let task: Task = read_manifest(self.repo(), oid)?;
        if task.status == TaskStatus::Running {
            return Err(CoreError::Conflict(format!(
                "task {} is still running, stop it first",
                id.short()
            )));
        }
        delete_entity_ref(self.repo(), EntityKind::Task, &id)?;
        let dir = self.task_dir(&id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        tracing::info!(id = %id, "deleted task");
        Ok(task)
    }

    /// Tasks whose latest record says they are still running.
    pub fn running_tasks(&self) -> Result<Vec<Task>, CoreError> {
        Ok(self
            .list_tasks(&ListOptions::default())?
            .into_iter()
            .filter(|t| t.status == TaskStatus::Running)
            .collect())
    }
}
