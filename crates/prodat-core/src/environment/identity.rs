use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::code::tracker::to_slash_path;
use crate::error::CoreError;
use crate::model::EntityId;

/// One file of an environment definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionFile {
    /// Path relative to the definition root, `/`-separated.
    pub path: String,
    pub content: Vec<u8>,
}

/// A loaded environment definition.
#[derive(Debug, Clone)]
pub struct Definition {
    /// Directory the definition was read from (build context).
    pub base: PathBuf,
    pub files: Vec<DefinitionFile>,
}

impl Definition {
    pub fn id(&self) -> EntityId {
        hash_definition(&self.files)
    }
}

/// Environment ID for a set of definition files.
///
/// SHA-256 over, per file in path order: path bytes, a zero byte, content
/// length as u64 little-endian, content bytes. Content is hashed byte for
/// byte, so CRLF and LF versions of the same file get different IDs.
pub fn hash_definition(files: &[DefinitionFile]) -> EntityId {
    let mut sorted: Vec<&DefinitionFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let total: usize = sorted.iter().map(|f| f.path.len() + 9 + f.content.len()).sum();
    let mut framed = Vec::with_capacity(total);
    for file in sorted {
        framed.extend_from_slice(file.path.as_bytes());
        framed.push(0);
        framed.extend_from_slice(&(file.content.len() as u64).to_le_bytes());
        framed.extend_from_slice(&file.content);
    }
    hash_bytes(&framed)
}

/// Plain SHA-256 of a single buffer.
pub fn hash_bytes(content: &[u8]) -> EntityId {
    EntityId::from_digest(content)
}

/// Load the definition files for an environment.
///
/// With explicit `paths` (relative to `root` or absolute), each directory
/// contributes all its files and each file contributes itself. Otherwise the
/// project's definition directory is used, then a root-level `Dockerfile`.
pub fn load_definition(root: &Path, env_dir: &str, paths: &[PathBuf]) -> Result<Definition, CoreError> {
    if !paths.is_empty() {
        let resolve = |p: &PathBuf| if p.is_absolute() { p.clone() } else { root.join(p) };
        let mut files = Vec::new();
        for p in paths {
            let abs = resolve(p);
            if abs.is_dir() {
                files.extend(read_dir_files(&abs)?);
            } else if abs.is_file() {
                let name = abs
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                files.push(DefinitionFile {
                    path: name,
                    content: std::fs::read(&abs)?,
                });
            } else {
                return Err(CoreError::NoEnvironmentDefinition(abs.display().to_string()));
            }
        }
        let first = resolve(&paths[0]);
        let base = if first.is_dir() {
            first
        } else {
            first
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf())
        };
        return Ok(Definition { base, files });
    }

    let dir = root.join(env_dir);
    if dir.is_dir() {
        let files = read_dir_files(&dir)?;
        if !files.is_empty() {
            return Ok(Definition { base: dir, files });
        }
    }

    let dockerfile = root.join("Dockerfile");
    if dockerfile.is_file() {
        return Ok(Definition {
            base: root.to_path_buf(),
            files: vec![DefinitionFile {
                path: "Dockerfile".into(),
                content: std::fs::read(&dockerfile)?,
            }],
        });
    }

    Err(CoreError::NoEnvironmentDefinition(dir.display().to_string()))
}

fn read_dir_files(dir: &Path) -> Result<Vec<DefinitionFile>, CoreError> {
    let mut files = Vec::new();
    for entry in WalkBuilder::new(dir).standard_filters(false).build() {
        let entry = entry?;
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        files.push(DefinitionFile {
            path: to_slash_path(rel),
            content: std::fs::read(entry.path())?,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
