use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{EntityId, SnapshotData, ValueMap};
use crate::storage::ProjectStore;

/// Differences between two snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotDiff {
    pub id_a: EntityId,
    pub id_b: EntityId,
    pub added_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub config: Vec<ValueChange>,
    pub stats: Vec<ValueChange>,
    pub environment_changed: bool,
}

/// One key whose value differs. `None` means the key is absent on that side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueChange {
    pub key: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added_files.is_empty()
            && self.removed_files.is_empty()
            && self.modified_files.is_empty()
            && self.config.is_empty()
            && self.stats.is_empty()
            && !self.environment_changed
    }
}

/// Compare two snapshots by ID or prefix. Changes read from `a` to `b`.
pub fn diff_snapshots(store: &ProjectStore, a: &str, b: &str) -> Result<SnapshotDiff, CoreError> {
    let data_a = store.read_snapshot(a)?;
    let data_b = store.read_snapshot(b)?;
    Ok(compute_diff(&data_a, &data_b))
}

fn compute_diff(data_a: &SnapshotData, data_b: &SnapshotData) -> SnapshotDiff {
    let files_a: BTreeMap<&str, (&str, bool)> = data_a
        .files
        .iter()
        .map(|f| (f.path.as_str(), (f.blob.as_str(), f.executable)))
        .collect();
    let files_b: BTreeMap<&str, (&str, bool)> = data_b
        .files
        .iter()
        .map(|f| (f.path.as_str(), (f.blob.as_str(), f.executable)))
        .collect();

    let added_files = files_b
        .keys()
        .filter(|p| !files_a.contains_key(*p))
        .map(|p| p.to_string())
        .collect();
    let removed_files = files_a
        .keys()
        .filter(|p| !files_b.contains_key(*p))
        .map(|p| p.to_string())
        .collect();
    let modified_files = files_a
        .iter()
        .filter(|(path, entry)| files_b.get(*path).is_some_and(|other| other != *entry))
        .map(|(path, _)| path.to_string())
        .collect();

    SnapshotDiff {
        id_a: data_a.snapshot.id.clone(),
        id_b: data_b.snapshot.id.clone(),
        added_files,
        removed_files,
        modified_files,
        config: diff_values(&data_a.snapshot.config, &data_b.snapshot.config),
        stats: diff_values(&data_a.snapshot.stats, &data_b.snapshot.stats),
        environment_changed: data_a.snapshot.environment_id != data_b.snapshot.environment_id,
    }
}

fn diff_values(a: &ValueMap, b: &ValueMap) -> Vec<ValueChange> {
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let before = a.get(key);
            let after = b.get(key);
            (before != after).then(|| ValueChange {
                key: key.clone(),
                before: before.cloned(),
                after: after.cloned(),
            })
        })
        .collect()
}
