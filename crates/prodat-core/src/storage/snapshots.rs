use chrono::Utc;
use git2::Oid;
use serde::Serialize;

use crate::code::{restore_files, tracked_files, CheckoutSummary};
use crate::error::CoreError;
use crate::model::{EntityId, EntityKind, NewSnapshot, Snapshot, SnapshotData};

use super::git_backend::{ListOptions, ProjectStore};
use super::objects::{list_tree_files, write_record, RecordEntry, FILES_TREE};
use super::read::{read_manifest, record_tree, subtree_oid};
use super::refs::{create_entity_ref, delete_entity_ref};

/// Result of restoring a snapshot into the working tree.
#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub snapshot_id: EntityId,
    /// The working tree already matched; nothing was touched.
    pub already_current: bool,
    #[serde(flatten)]
    pub summary: CheckoutSummary,
}

impl ProjectStore {
    /// Capture the working tree, config and stats as a new snapshot.
    pub fn create_snapshot(&self, new: NewSnapshot) -> Result<Snapshot, CoreError> {
        let _lock = self.lock()?;
        let driver = self.config()?.driver;
        self.create_snapshot_unlocked(new, &driver)
    }

    pub(crate) fn create_snapshot_unlocked(
        &self,
        new: NewSnapshot,
        driver: &str,
    ) -> Result<Snapshot, CoreError> {
        let session = self.current_session()?;
        let code_tree = self.save_code_unlocked(&new.paths)?;
        let explicit = new.environment_id.as_ref().map(EntityId::as_str);
        let environment = self.resolve_environment_unlocked(explicit, driver)?;

        let mut snapshot = Snapshot {
            id: EntityId::default(),
            message: new.message,
            created_at: Utc::now(),
            code_id: code_tree.to_string(),
            environment_id: environment.map(|e| e.id),
            task_id: new.task_id,
            session_id: session.id,
            visible: new.visible,
            config: new.config,
            stats: new.stats,
        };
        snapshot.id = snapshot.compute_id();

        self.write_snapshot(&snapshot, code_tree)?;
        tracing::info!(
            id = %snapshot.id,
            code_id = %snapshot.code_id,
            visible = snapshot.visible,
            "created snapshot"
        );
        Ok(snapshot)
    }

    fn write_snapshot(&self, snapshot: &Snapshot, code_tree: Oid) -> Result<(), CoreError> {
        let commit = write_record(
            self.repo(),
            EntityKind::Snapshot,
            &snapshot.id,
            snapshot,
            vec![(FILES_TREE, RecordEntry::Tree(code_tree))],
            None,
        )?;
        create_entity_ref(self.repo(), EntityKind::Snapshot, &snapshot.id, commit)
    }

    /// Read a snapshot and its file list by ID or unique ID prefix.
    pub fn read_snapshot(&self, id_or_prefix: &str) -> Result<SnapshotData, CoreError> {
        let (_, oid) = self.resolve_ref(EntityKind::Snapshot, id_or_prefix)?;
        let snapshot: Snapshot = read_manifest(self.repo(), oid)?;
        let tree = record_tree(self.repo(), oid)?;
        let files = list_tree_files(self.repo(), subtree_oid(&tree, FILES_TREE)?)?;
        Ok(SnapshotData { snapshot, files })
    }

    /// Read a snapshot and fail if its content no longer hashes to its ID.
    pub fn verify_snapshot(&self, id_or_prefix: &str) -> Result<SnapshotData, CoreError> {
        let data = self.read_snapshot(id_or_prefix)?;
        let actual = data.snapshot.compute_id();
        if actual != data.snapshot.id {
            return Err(CoreError::Integrity {
                id: data.snapshot.id.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(data)
    }

    /// List snapshots, newest first. Hidden snapshots need `include_hidden`.
    pub fn list_snapshots(&self, opts: &ListOptions) -> Result<Vec<Snapshot>, CoreError> {
        let mut snapshots: Vec<Snapshot> = self
            .read_all(EntityKind::Snapshot, |s: &Snapshot| s.created_at)?
            .into_iter()
            .filter(|s| opts.include_hidden || s.visible)
            .filter(|s| opts.session.as_ref().map_or(true, |id| &s.session_id == id))
            .collect();
        if let Some(limit) = opts.limit {
            snapshots.truncate(limit);
        }
        Ok(snapshots)
    }

    /// Delete a snapshot's ref. Blobs shared with other records stay.
    pub fn delete_snapshot(&self, id_or_prefix: &str) -> Result<EntityId, CoreError> {
        let _lock = self.lock()?;
        let (id, _) = self.resolve_ref(EntityKind::Snapshot, id_or_prefix)?;
        delete_entity_ref(self.repo(), EntityKind::Snapshot, &id)?;
        tracing::info!(id = %id, "deleted snapshot");
        Ok(id)
    }

    /// Restore the working tree to a snapshot's file set.
    ///
    /// Refuses with `UnsavedChanges` when the current tree was never saved,
    /// unless `force` is set. The snapshot record itself is never modified.
    pub fn checkout_snapshot(&self, id_or_prefix: &str, force: bool) -> Result<Checkout, CoreError> {
        let _lock = self.lock()?;
        self.checkout_snapshot_unlocked(id_or_prefix, force)
    }

    pub(crate) fn checkout_snapshot_unlocked(
        &self,
        id_or_prefix: &str,
        force: bool,
    ) -> Result<Checkout, CoreError> {
        let data = self.read_snapshot(id_or_prefix)?;
        let current_files = tracked_files(self.root())?;
        let current_tree = self.hash_code_tree(&current_files)?;

        if current_tree.to_string() == data.snapshot.code_id {
            tracing::debug!(id = %data.snapshot.id, "working tree already matches snapshot");
            return Ok(Checkout {
                snapshot_id: data.snapshot.id,
                already_current: true,
                summary: CheckoutSummary {
                    unchanged: data.files.len(),
                    ..Default::default()
                },
            });
        }
        if !force && self.is_unsaved(current_files.is_empty(), current_tree)? {
            return Err(CoreError::UnsavedChanges);
        }

        let summary = restore_files(self.repo(), self.root(), &current_files, &data.files)?;
        tracing::info!(id = %data.snapshot.id, written = summary.written, removed = summary.removed, "checked out snapshot");
        Ok(Checkout {
            snapshot_id: data.snapshot.id,
            already_current: false,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueMap;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn setup() -> (TempDir, ProjectStore) {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "train.py", "lr = 0.1\n");
        write(tmp.path(), "model/net.py", "layers = 2\n");
        let store = ProjectStore::init(tmp.path(), None, None).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_create_and_read() {
        let (_tmp, store) = setup();
        let mut new = NewSnapshot::new("baseline");
        new.config.insert("lr".into(), serde_json::json!(0.1));
        new.stats.insert("accuracy".into(), serde_json::json!(0.93));
        let snapshot = store.create_snapshot(new).unwrap();

        assert!(snapshot.verify());
        assert_eq!(snapshot.id.as_str().len(), 64);
        assert!(snapshot.environment_id.is_none());

        let data = store.read_snapshot(snapshot.id.short()).unwrap();
        assert_eq!(data.snapshot, snapshot);
        let paths: Vec<_> = data.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["model/net.py", "train.py"]);
        assert_eq!(data.snapshot.stats["accuracy"], serde_json::json!(0.93));

        store.verify_snapshot(snapshot.id.as_str()).unwrap();
    }

    #[test]
    fn test_snapshot_records_default_environment() {
        let (tmp, store) = setup();
        write(tmp.path(), "prodat_environment/Dockerfile", "FROM ubuntu:22.04\n");
        let snapshot = store.create_snapshot(NewSnapshot::new("with env")).unwrap();
        let environment_id = snapshot.environment_id.unwrap();
        assert_eq!(store.read_environment(environment_id.as_str()).unwrap().id, environment_id);
    }

    #[test]
    fn test_checkout_restores_exact_state() {
        let (tmp, store) = setup();
        let first = store.create_snapshot(NewSnapshot::new("first")).unwrap();

        write(tmp.path(), "train.py", "lr = 0.01\n");
        write(tmp.path(), "model/extra/layer.py", "x\n");
        store.create_snapshot(NewSnapshot::new("second")).unwrap();

        let checkout = store.checkout_snapshot(first.id.as_str(), false).unwrap();
        assert!(!checkout.already_current);
        assert_eq!(checkout.summary.written, 1);
        assert_eq!(checkout.summary.removed, 1);
        assert_eq!(std::fs::read_to_string(tmp.path().join("train.py")).unwrap(), "lr = 0.1\n");
        assert!(!tmp.path().join("model/extra").exists());
        assert_eq!(store.current_code_id().unwrap(), first.code_id);

        // Second checkout of the same snapshot is a no-op
        let again = store.checkout_snapshot(first.id.as_str(), false).unwrap();
        assert!(again.already_current);
        assert_eq!(again.summary.written, 0);
    }

    #[test]
    fn test_checkout_refuses_unsaved_changes() {
        let (tmp, store) = setup();
        let first = store.create_snapshot(NewSnapshot::new("first")).unwrap();
        write(tmp.path(), "train.py", "edited but not saved\n");

        assert!(matches!(
            store.checkout_snapshot(first.id.as_str(), false),
            Err(CoreError::UnsavedChanges)
        ));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("train.py")).unwrap(),
            "edited but not saved\n"
        );

        store.checkout_snapshot(first.id.as_str(), true).unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("train.py")).unwrap(), "lr = 0.1\n");
    }

    #[test]
    fn test_checkout_leaves_ignored_files() {
        let (tmp, store) = setup();
        write(tmp.path(), ".prodatignore", "*.ckpt\n");
        let first = store.create_snapshot(NewSnapshot::new("first")).unwrap();
        write(tmp.path(), "weights.ckpt", "binary");
        write(tmp.path(), "notes.md", "later");
        store.create_snapshot(NewSnapshot::new("second")).unwrap();

        store.checkout_snapshot(first.id.as_str(), false).unwrap();
        assert!(tmp.path().join("weights.ckpt").exists());
        assert!(!tmp.path().join("notes.md").exists());
    }

    #[test]
    fn test_list_filters_hidden_and_session() {
        let (_tmp, store) = setup();
        store.create_snapshot(NewSnapshot::new("visible")).unwrap();
        let mut hidden = NewSnapshot::new("hidden");
        hidden.visible = false;
        store.create_snapshot(hidden).unwrap();

        assert_eq!(store.list_snapshots(&ListOptions::default()).unwrap().len(), 1);
        let all = ListOptions {
            include_hidden: true,
            ..Default::default()
        };
        let listed = store.list_snapshots(&all).unwrap();
        assert_eq!(listed.len(), 2);
        // Newest first
        assert!(listed[0].created_at >= listed[1].created_at);

        let other = store.create_session("other").unwrap();
        let in_other = ListOptions {
            session: Some(other.id),
            include_hidden: true,
            ..Default::default()
        };
        assert!(store.list_snapshots(&in_other).unwrap().is_empty());

        let limited = ListOptions {
            limit: Some(1),
            include_hidden: true,
            ..Default::default()
        };
        assert_eq!(store.list_snapshots(&limited).unwrap().len(), 1);
    }

    #[test]
    fn test_restricted_paths_and_delete() {
        let (_tmp, store) = setup();
        let mut new = NewSnapshot::new("model only");
        new.paths = vec![PathBuf::from("model")];
        new.config = ValueMap::new();
        let snapshot = store.create_snapshot(new).unwrap();
        let data = store.read_snapshot(snapshot.id.as_str()).unwrap();
        assert_eq!(data.files.len(), 1);

        store.delete_snapshot(snapshot.id.as_str()).unwrap();
        assert!(matches!(
            store.read_snapshot(snapshot.id.as_str()),
            Err(CoreError::NotFound { .. })
        ));
    }
}
