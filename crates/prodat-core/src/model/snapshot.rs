use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Key/value pairs logged alongside a snapshot. Ordered so hashing is stable.
pub type ValueMap = BTreeMap<String, serde_json::Value>;

/// An immutable record of the project's tracked files, config and stats.
/// Stored as manifest.json in the snapshot tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub id: EntityId,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Tree ID of the tracked file set.
    pub code_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<EntityId>,
    pub session_id: EntityId,
    pub visible: bool,
    #[serde(default)]
    pub config: ValueMap,
    #[serde(default)]
    pub stats: ValueMap,
}

/// Everything hashed into a snapshot ID: the record minus the ID itself.
#[derive(Serialize)]
struct SnapshotContent<'a> {
    message: &'a str,
    created_at: &'a DateTime<Utc>,
    code_id: &'a str,
    environment_id: &'a Option<EntityId>,
    task_id: &'a Option<EntityId>,
    session_id: &'a EntityId,
    visible: bool,
    config: &'a ValueMap,
    stats: &'a ValueMap,
}

impl Snapshot {
    /// Content hash of every field except `id`.
    pub fn compute_id(&self) -> EntityId {
        let content = SnapshotContent {
            message: &self.message,
            created_at: &self.created_at,
            code_id: &self.code_id,
            environment_id: &self.environment_id,
            task_id: &self.task_id,
            session_id: &self.session_id,
            visible: self.visible,
            config: &self.config,
            stats: &self.stats,
        };
        // Serializing plain structs and BTreeMaps cannot fail.
        let bytes = serde_json::to_vec(&content).unwrap_or_default();
        EntityId::from_digest(&bytes)
    }

    /// True when the stored ID matches the record content.
    pub fn verify(&self) -> bool {
        self.compute_id() == self.id
    }
}

/// One file captured in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackedFile {
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    /// Blob ID of the content.
    pub blob: String,
    #[serde(default)]
    pub executable: bool,
}

/// A snapshot together with its file list.
#[derive(Debug, Clone)]
pub struct SnapshotData {
    pub snapshot: Snapshot,
    pub files: Vec<TrackedFile>,
}

/// Input for creating a snapshot.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub message: String,
    /// Restrict the snapshot to these files or directories. Empty means all tracked files.
    pub paths: Vec<PathBuf>,
    pub config: ValueMap,
    pub stats: ValueMap,
    pub environment_id: Option<EntityId>,
    pub task_id: Option<EntityId>,
    pub visible: bool,
}

impl NewSnapshot {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            paths: Vec::new(),
            config: ValueMap::new(),
            stats: ValueMap::new(),
            environment_id: None,
            task_id: None,
            visible: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot {
            id: EntityId(String::new()),
            message: "baseline".into(),
            created_at: Utc::now(),
            code_id: "4b825dc642cb6eb9a060e54bf8d69288fbee4904".into(),
            environment_id: None,
            task_id: None,
            session_id: EntityId::new(),
            visible: true,
            config: ValueMap::from([("lr".to_string(), serde_json::json!(0.01))]),
            stats: ValueMap::from([("acc".to_string(), serde_json::json!(0.93))]),
        };
        snapshot.id = snapshot.compute_id();
        snapshot
    }

    #[test]
    fn test_id_is_content_hash() {
        let snapshot = sample();
        assert_eq!(snapshot.id.as_str().len(), 64);
        assert!(snapshot.verify());

        let mut tampered = snapshot.clone();
        tampered.stats.insert("acc".into(), serde_json::json!(0.99));
        assert!(!tampered.verify());
    }

    #[test]
    fn test_verify_survives_serde_roundtrip() {
        let snapshot = sample();
        let json = serde_json::to_string_pretty(&snapshot).unwrap();
        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, parsed);
        assert!(parsed.verify());
    }
}
