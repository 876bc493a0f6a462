use std::collections::BTreeMap;

use git2::{ObjectType, Oid, Repository, Signature, TreeWalkMode, TreeWalkResult};
use serde::Serialize;

use crate::error::CoreError;
use crate::model::{EntityId, EntityKind, TrackedFile};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const FILES_TREE: &str = "files";
pub const DEFINITION_TREE: &str = "definition";
pub const OUTPUT_LOG: &str = "output.log";

const MODE_FILE: i32 = 0o100644;
const MODE_EXECUTABLE: i32 = 0o100755;
const MODE_TREE: i32 = 0o040000;

/// An extra entry placed next to manifest.json in a record tree.
pub enum RecordEntry {
    Blob(Vec<u8>),
    Tree(Oid),
}

/// Build a record tree and wrap it in a commit. Returns the commit Oid.
///
/// Object layout:
///   commit (message = "prodat <kind>: {id}", parent = previous version if any)
///     -> tree
///        -> blob "manifest.json"
///        -> any extra entries (blobs or subtrees)
pub fn write_record<T: Serialize>(
    repo: &Repository,
    kind: EntityKind,
    id: &EntityId,
    manifest: &T,
    entries: Vec<(&str, RecordEntry)>,
    parent: Option<Oid>,
) -> Result<Oid, CoreError> {
    let manifest_bytes = serde_json::to_vec_pretty(manifest)?;
    let manifest_oid = repo.blob(&manifest_bytes)?;

    let mut builder = repo.treebuilder(None)?;
    builder.insert(MANIFEST_FILE, manifest_oid, MODE_FILE)?;
    for (name, entry) in entries {
        match entry {
            RecordEntry::Blob(bytes) => {
                let oid = repo.blob(&bytes)?;
                builder.insert(name, oid, MODE_FILE)?;
            }
            RecordEntry::Tree(oid) => {
                builder.insert(name, oid, MODE_TREE)?;
            }
        }
    }
    let tree_oid = builder.write()?;
    let tree = repo.find_tree(tree_oid)?;

    let parents = match parent {
        Some(oid) => vec![repo.find_commit(oid)?],
        None => Vec::new(),
    };
    let parent_refs: Vec<_> = parents.iter().collect();

    let sig = signature()?;
    let message = format!("prodat {}: {}", kind.to_string().to_lowercase(), id);
    let commit_oid = repo.commit(None, &sig, &sig, &message, &tree, &parent_refs)?;
    Ok(commit_oid)
}

/// Wrap an existing tree in a parentless commit (used for saved code trees).
pub fn commit_tree(repo: &Repository, tree_oid: Oid, message: &str) -> Result<Oid, CoreError> {
    let tree = repo.find_tree(tree_oid)?;
    let sig = signature()?;
    Ok(repo.commit(None, &sig, &sig, message, &tree, &[])?)
}

fn signature() -> Result<Signature<'static>, CoreError> {
    Ok(Signature::now("prodat", "prodat@local")?)
}

/// A file to place in a nested tree.
#[derive(Debug, Clone)]
pub struct TreeFile {
    /// `/`-separated path relative to the tree root.
    pub path: String,
    pub blob: Oid,
    pub executable: bool,
}

enum Node {
    File(Oid, i32),
    Dir(BTreeMap<String, Node>),
}

/// Write a nested tree from a flat list of files. Returns the root tree Oid.
/// Identical file sets always produce the same Oid.
pub fn build_tree(repo: &Repository, files: &[TreeFile]) -> Result<Oid, CoreError> {
    let mut root: BTreeMap<String, Node> = BTreeMap::new();
    for file in files {
        let mode = if file.executable {
            MODE_EXECUTABLE
        } else {
            MODE_FILE
        };
        let mut components: Vec<&str> = file.path.split('/').filter(|c| !c.is_empty()).collect();
        let Some(leaf) = components.pop() else {
            continue;
        };
        let mut dir = &mut root;
        for component in components {
            let node = dir
                .entry(component.to_string())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            dir = match node {
                Node::Dir(children) => children,
                Node::File(..) => {
                    return Err(CoreError::Parse(format!(
                        "'{}' is both a file and a directory",
                        file.path
                    )))
                }
            };
        }
        if let Some(Node::Dir(_)) = dir.get(leaf) {
            return Err(CoreError::Parse(format!(
                "'{}' is both a file and a directory",
                file.path
            )));
        }
        dir.insert(leaf.to_string(), Node::File(file.blob, mode));
    }
    write_dir(repo, &root)
}

fn write_dir(repo: &Repository, dir: &BTreeMap<String, Node>) -> Result<Oid, CoreError> {
    let mut builder = repo.treebuilder(None)?;
    for (name, node) in dir {
        match node {
            Node::File(oid, mode) => {
                builder.insert(name, *oid, *mode)?;
            }
            Node::Dir(children) => {
                let oid = write_dir(repo, children)?;
                builder.insert(name, oid, MODE_TREE)?;
            }
        }
    }
    Ok(builder.write()?)
}

/// Flatten a tree into its files, sorted by path.
pub fn list_tree_files(repo: &Repository, tree_oid: Oid) -> Result<Vec<TrackedFile>, CoreError> {
    let tree = repo.find_tree(tree_oid)?;
    let mut files = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            if let Some(name) = entry.name() {
                files.push(TrackedFile {
                    path: format!("{dir}{name}"),
                    blob: entry.id().to_string(),
                    executable: entry.filemode() == MODE_EXECUTABLE,
                });
            }
        }
        TreeWalkResult::Ok
    })?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Read a blob's content by its hex ID.
pub fn read_blob(repo: &Repository, blob_id: &str) -> Result<Vec<u8>, CoreError> {
    let oid = Oid::from_str(blob_id)?;
    let blob = repo
        .find_blob(oid)
        .map_err(|_| CoreError::MissingBlob(blob_id.to_string()))?;
    Ok(blob.content().to_vec())
}
