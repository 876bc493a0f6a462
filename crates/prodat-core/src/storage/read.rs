use git2::{Oid, Repository, Tree};
use serde::de::DeserializeOwned;

use crate::error::CoreError;

use super::objects::MANIFEST_FILE;

/// Read a record's manifest from its commit Oid.
pub fn read_manifest<T: DeserializeOwned>(repo: &Repository, commit_oid: Oid) -> Result<T, CoreError> {
    let commit = repo.find_commit(commit_oid)?;
    let tree = commit.tree()?;
    read_blob_json(repo, &tree, MANIFEST_FILE)
}

/// The record tree of a commit.
pub fn record_tree(repo: &Repository, commit_oid: Oid) -> Result<Tree<'_>, CoreError> {
    Ok(repo.find_commit(commit_oid)?.tree()?)
}

pub fn read_blob_bytes(repo: &Repository, tree: &Tree, name: &str) -> Result<Vec<u8>, CoreError> {
    let entry = tree
        .get_name(name)
        .ok_or_else(|| CoreError::MissingBlob(name.to_string()))?;
    let blob = repo.find_blob(entry.id())?;
    Ok(blob.content().to_vec())
}

/// Same as `read_blob_bytes`, but a missing entry yields `None`.
pub fn read_optional_blob(repo: &Repository, tree: &Tree, name: &str) -> Result<Option<Vec<u8>>, CoreError> {
    match tree.get_name(name) {
        Some(entry) => Ok(Some(repo.find_blob(entry.id())?.content().to_vec())),
        None => Ok(None),
    }
}

/// Oid of a named subtree entry.
pub fn subtree_oid(tree: &Tree, name: &str) -> Result<Oid, CoreError> {
    tree.get_name(name)
        .map(|e| e.id())
        .ok_or_else(|| CoreError::MissingBlob(format!("{name}/")))
}

fn read_blob_json<T: DeserializeOwned>(repo: &Repository, tree: &Tree, name: &str) -> Result<T, CoreError> {
    let bytes = read_blob_bytes(repo, tree, name)?;
    serde_json::from_slice(&bytes).map_err(CoreError::InvalidManifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityId, EntityKind, Session};
    use crate::storage::objects::{write_record, RecordEntry, OUTPUT_LOG};
    use tempfile::TempDir;

    #[test]
    fn test_read_manifest_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init_bare(tmp.path()).unwrap();

        let session = Session::new("sweep");
        let commit_oid = write_record(
            &repo,
            EntityKind::Session,
            &session.id,
            &session,
            vec![],
            None,
        )
        .unwrap();

        let loaded: Session = read_manifest(&repo, commit_oid).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_optional_and_missing_entries() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init_bare(tmp.path()).unwrap();
        let id = EntityId::new();
        let commit_oid = write_record(
            &repo,
            EntityKind::Task,
            &id,
            &serde_json::json!({}),
            vec![(OUTPUT_LOG, RecordEntry::Blob(b"out".to_vec()))],
            None,
        )
        .unwrap();
        let tree = record_tree(&repo, commit_oid).unwrap();

        assert_eq!(
            read_optional_blob(&repo, &tree, OUTPUT_LOG).unwrap(),
            Some(b"out".to_vec())
        );
        assert!(read_optional_blob(&repo, &tree, "missing").unwrap().is_none());
        assert!(matches!(
            read_blob_bytes(&repo, &tree, "missing"),
            Err(CoreError::MissingBlob(_))
        ));
        assert!(subtree_oid(&tree, "files").is_err());
    }

    #[test]
    fn test_corrupt_manifest_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init_bare(tmp.path()).unwrap();
        let id = EntityId::new();
        let commit_oid = write_record(
            &repo,
            EntityKind::Session,
            &id,
            &serde_json::json!({"unexpected": true}),
            vec![],
            None,
        )
        .unwrap();
        assert!(matches!(
            read_manifest::<Session>(&repo, commit_oid),
            Err(CoreError::InvalidManifest(_))
        ));
    }
}
