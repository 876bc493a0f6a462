//! Core data model and storage engine for prodat.
//!
//! Project state lives in a hidden `.prodat` directory at the project root,
//! which is a bare Git repository. Snapshots, environments, tasks and
//! sessions are orphan commits named by refs under `refs/prodat/`.

pub mod code;
pub mod config;
pub mod diff;
pub mod environment;
pub mod error;
pub mod model;
pub mod storage;

pub use error::CoreError;
pub use storage::{ListOptions, ProjectStore};

/// Name of the hidden state directory at the project root.
pub const STATE_DIR: &str = ".prodat";

/// Set in a task's process: the task ID.
pub const TASK_ID_ENV: &str = "PRODAT_TASK_ID";
/// Set in a task's process: directory where config.json / stats.json are written.
pub const TASK_DIR_ENV: &str = "PRODAT_TASK_DIR";
/// File in the task directory holding logged configuration.
pub const CONFIG_FILE: &str = "config.json";
/// File in the task directory holding logged stats.
pub const STATS_FILE: &str = "stats.json";
