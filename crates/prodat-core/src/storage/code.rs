use std::path::PathBuf;

use git2::{Oid, Repository};

use crate::code::{restrict_to, tracked_files, write_code_tree};
use crate::error::CoreError;
use crate::model::{EntityId, EntityKind};

use super::git_backend::ProjectStore;
use super::objects::commit_tree;
use super::refs::{create_entity_ref, find_entity_ref, list_entity_refs};

/// Above the loose (1) and packed (2) backends, so scratch writes land in memory.
const SCRATCH_PRIORITY: i32 = 1000;

impl ProjectStore {
    /// Store the tracked files (optionally restricted to `paths`) and return the code ID.
    /// Saving an unchanged tree writes nothing new.
    pub fn save_code(&self, paths: &[PathBuf]) -> Result<String, CoreError> {
        let _lock = self.lock()?;
        Ok(self.save_code_unlocked(paths)?.to_string())
    }

    pub(crate) fn save_code_unlocked(&self, paths: &[PathBuf]) -> Result<Oid, CoreError> {
        let files = restrict_to(tracked_files(self.root())?, paths)?;
        let tree_oid = write_code_tree(self.repo(), self.root(), &files)?;
        let id = EntityId(tree_oid.to_string());
        if find_entity_ref(self.repo(), EntityKind::Code, &id).is_none() {
            let commit = commit_tree(self.repo(), tree_oid, &format!("prodat code: {id}"))?;
            create_entity_ref(self.repo(), EntityKind::Code, &id, commit)?;
            tracing::info!(code_id = %id, files = files.len(), "saved code");
        }
        Ok(tree_oid)
    }

    /// Code ID of the working tree as it is right now.
    pub fn current_code_id(&self) -> Result<String, CoreError> {
        let files = tracked_files(self.root())?;
        Ok(self.hash_code_tree(&files)?.to_string())
    }

    /// Hash the working tree without persisting anything: blobs and trees
    /// go to an in-memory backend on a scratch handle that is dropped here.
    pub(crate) fn hash_code_tree(&self, files: &[String]) -> Result<Oid, CoreError> {
        let scratch = Repository::open_bare(self.state_dir())?;
        let odb = scratch.odb()?;
        let _mempack = odb.add_new_mempack_backend(SCRATCH_PRIORITY)?;
        write_code_tree(&scratch, self.root(), files)
    }

    /// True when the working tree's code ID has never been saved.
    ///
    /// A project with no tracked files is clean once any code was saved, and
    /// unsaved before that.
    pub fn has_unsaved_changes(&self) -> Result<bool, CoreError> {
        let files = tracked_files(self.root())?;
        let tree = self.hash_code_tree(&files)?;
        self.is_unsaved(files.is_empty(), tree)
    }

    pub(crate) fn is_unsaved(&self, no_tracked_files: bool, tree_oid: Oid) -> Result<bool, CoreError> {
        if no_tracked_files {
            return Ok(list_entity_refs(self.repo(), EntityKind::Code)?.is_empty());
        }
        Ok(!self.is_code_saved(tree_oid))
    }

    fn is_code_saved(&self, tree_oid: Oid) -> bool {
        find_entity_ref(self.repo(), EntityKind::Code, &EntityId(tree_oid.to_string())).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn loose_objects(state_dir: &Path) -> usize {
        std::fs::read_dir(state_dir.join("objects"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().len() == 2)
            .map(|e| std::fs::read_dir(e.path()).unwrap().count())
            .sum()
    }

    fn setup() -> (TempDir, ProjectStore) {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("train.py"), "print('train')\n").unwrap();
        std::fs::create_dir_all(tmp.path().join("data")).unwrap();
        std::fs::write(tmp.path().join("data/labels.csv"), "a,b\n").unwrap();
        let store = ProjectStore::init(tmp.path(), None, None).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_identical_trees_share_code_id() {
        let (_tmp, store) = setup();
        let first = store.save_code(&[]).unwrap();
        let second = store.save_code(&[]).unwrap();
        assert_eq!(first, second);
        assert_eq!(list_entity_refs(store.repo(), EntityKind::Code).unwrap().len(), 1);
    }

    #[test]
    fn test_unsaved_changes_tracking() {
        let (tmp, store) = setup();
        assert!(store.has_unsaved_changes().unwrap());

        store.save_code(&[]).unwrap();
        assert!(!store.has_unsaved_changes().unwrap());

        std::fs::write(tmp.path().join("train.py"), "print('changed')\n").unwrap();
        assert!(store.has_unsaved_changes().unwrap());
    }

    #[test]
    fn test_empty_project_is_unsaved() {
        let tmp = TempDir::new().unwrap();
        let store = ProjectStore::init(tmp.path(), None, None).unwrap();
        assert!(store.has_unsaved_changes().unwrap());
    }

    #[test]
    fn test_empty_project_is_clean_after_save() {
        let tmp = TempDir::new().unwrap();
        let store = ProjectStore::init(tmp.path(), None, None).unwrap();
        store.save_code(&[]).unwrap();
        assert!(!store.has_unsaved_changes().unwrap());
    }

    #[test]
    fn test_status_checks_write_no_objects() {
        let (tmp, store) = setup();
        store.save_code(&[]).unwrap();
        let before = loose_objects(store.state_dir());

        for i in 0..5 {
            std::fs::write(tmp.path().join("train.py"), format!("epochs = {i}\n")).unwrap();
            assert!(store.has_unsaved_changes().unwrap());
            store.current_code_id().unwrap();
        }
        assert_eq!(loose_objects(store.state_dir()), before);

        let saved = store.save_code(&[]).unwrap();
        assert_eq!(store.current_code_id().unwrap(), saved);
        assert!(loose_objects(store.state_dir()) > before);
    }

    #[test]
    fn test_ignored_files_do_not_change_code_id() {
        let (tmp, store) = setup();
        std::fs::write(tmp.path().join(".prodatignore"), "*.log\n").unwrap();
        let before = store.current_code_id().unwrap();
        std::fs::write(tmp.path().join("run.log"), "noise").unwrap();
        assert_eq!(store.current_code_id().unwrap(), before);
    }

    #[test]
    fn test_restricted_save() {
        let (_tmp, store) = setup();
        let all = store.save_code(&[]).unwrap();
        let data_only = store.save_code(&[PathBuf::from("data")]).unwrap();
        assert_ne!(all, data_only);
        assert!(matches!(
            store.save_code(&[PathBuf::from("missing.py")]),
            Err(CoreError::PathNotTracked(_))
        ));
    }
}
