use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// A reproducible execution context, identified by the hash of its definition files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Driver that built this environment (e.g. "local", "docker").
    pub driver: String,
    /// Definition file paths, relative to the definition root.
    pub files: Vec<String>,
}

/// Input for creating an environment.
#[derive(Debug, Clone, Default)]
pub struct NewEnvironment {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Definition files to hash. Empty means the project's definition directory.
    pub paths: Vec<PathBuf>,
    pub make_default: bool,
}
