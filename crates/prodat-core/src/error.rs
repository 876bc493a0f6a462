use thiserror::Error;

use crate::model::EntityKind;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Ambiguous {kind} ID prefix '{prefix}': {count} matches")]
    Ambiguous {
        kind: EntityKind,
        prefix: String,
        count: usize,
    },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(#[from] serde_json::Error),

    #[error("No prodat project found (run `prodat init`)")]
    NotInitialized,

    #[error("A prodat project already exists at {0}")]
    AlreadyInitialized(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing blob in record tree: {0}")]
    MissingBlob(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid ID: {0}")]
    InvalidId(String),

    #[error("Working tree has unsaved changes (create a snapshot first or use --force)")]
    UnsavedChanges,

    #[error("No environment definition found at {0}")]
    NoEnvironmentDefinition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Path is not tracked: {0}")]
    PathNotTracked(String),

    #[error("Working tree walk failed: {0}")]
    Walk(#[from] ignore::Error),

    #[error("Snapshot {id} failed integrity check (content hashes to {actual})")]
    Integrity { id: String, actual: String },
}
