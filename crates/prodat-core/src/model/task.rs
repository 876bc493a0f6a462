use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One invocation of a user command (an experiment).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: EntityId,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<EntityId>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Start time of `pid` as the OS reported it, to tell the task's process
    /// apart from a later one reusing the pid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_started: Option<String>,
    /// Working tree state the command ran against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_snapshot_id: Option<EntityId>,
    /// State and logged config/stats after the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_snapshot_id: Option<EntityId>,
    pub session_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerun_of: Option<EntityId>,
    /// Workspace preset that launched this task (notebook, rstudio, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(default)]
    pub stopped: bool,
}

impl Task {
    pub fn new(command: impl Into<String>, session_id: EntityId) -> Self {
        Self {
            id: EntityId::new(),
            command: command.into(),
            environment_id: None,
            status: TaskStatus::Running,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            exit_code: None,
            pid: None,
            pid_started: None,
            before_snapshot_id: None,
            after_snapshot_id: None,
            session_id,
            rerun_of: None,
            workspace: None,
            stopped: false,
        }
    }

    /// Wall-clock duration, once the task has ended.
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.ended_at? - self.started_at?)
    }
}

/// A task together with its captured output.
#[derive(Debug, Clone)]
pub struct TaskData {
    pub task: Task,
    pub output: Vec<u8>,
}
