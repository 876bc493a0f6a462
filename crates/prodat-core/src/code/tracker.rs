use std::path::{Component, Path, PathBuf};

use git2::{Oid, Repository};
use ignore::WalkBuilder;

use crate::error::CoreError;
use crate::storage::objects::{build_tree, TreeFile};
use crate::STATE_DIR;

/// Gitignore-style file at the project root listing paths prodat never tracks.
pub const IGNORE_FILE: &str = ".prodatignore";

/// List tracked files under `root`: relative, `/`-separated, sorted.
///
/// Excludes `.prodat/`, `.git/` and anything matched by `.prodatignore`.
/// Hidden files are tracked. `.gitignore` is not consulted.
pub fn tracked_files(root: &Path) -> Result<Vec<String>, CoreError> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .follow_links(false)
        .add_custom_ignore_filename(IGNORE_FILE)
        .filter_entry(|e| {
            let name = e.file_name().to_str();
            name != Some(STATE_DIR) && name != Some(".git")
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("Skipping walk error: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let rel_path = entry.path().strip_prefix(root).unwrap_or(entry.path());
        files.push(to_slash_path(rel_path));
    }
    files.sort();
    Ok(files)
}

/// Keep only files equal to, or under, one of `paths`.
/// Every requested path must match at least one tracked file.
pub fn restrict_to(files: Vec<String>, paths: &[PathBuf]) -> Result<Vec<String>, CoreError> {
    if paths.is_empty() {
        return Ok(files);
    }
    let wanted: Vec<String> = paths
        .iter()
        .map(|p| to_slash_path(p).trim_end_matches('/').to_string())
        .collect();

    for w in &wanted {
        if !files.iter().any(|f| path_matches(f, w)) {
            return Err(CoreError::PathNotTracked(w.clone()));
        }
    }
    Ok(files
        .into_iter()
        .filter(|f| wanted.iter().any(|w| path_matches(f, w)))
        .collect())
}

fn path_matches(file: &str, wanted: &str) -> bool {
    wanted.is_empty()
        || file == wanted
        || (file.starts_with(wanted) && file.as_bytes().get(wanted.len()) == Some(&b'/'))
}

/// Store every listed file as a blob and build the code tree. Returns the tree Oid.
pub fn write_code_tree(repo: &Repository, root: &Path, files: &[String]) -> Result<Oid, CoreError> {
    let mut entries = Vec::with_capacity(files.len());
    for rel in files {
        let abs = root.join(rel);
        let blob = repo.blob_path(&abs)?;
        let metadata = std::fs::metadata(&abs)?;
        entries.push(TreeFile {
            path: rel.clone(),
            blob,
            executable: is_executable(&metadata),
        });
    }
    build_tree(repo, &entries)
}

/// Relative path as `/`-separated string, dropping `.` components.
pub(crate) fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_excludes_state_and_git_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, ".prodat/HEAD", "ref");
        write(root, ".git/HEAD", "ref: refs/heads/main");
        write(root, "train.py", "print(1)");
        write(root, ".env.example", "A=1");

        let files = tracked_files(root).unwrap();
        assert_eq!(files, vec![".env.example", "train.py"]);
    }

    #[test]
    fn test_respects_prodatignore_not_gitignore() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, IGNORE_FILE, "*.ckpt\noutputs/\n");
        write(root, ".gitignore", "data/\n");
        write(root, "model.ckpt", "weights");
        write(root, "outputs/run1.log", "log");
        write(root, "data/train.csv", "a,b");
        write(root, "src/model.py", "class M: pass");

        let files = tracked_files(root).unwrap();
        assert!(files.contains(&"src/model.py".to_string()));
        assert!(files.contains(&"data/train.csv".to_string()));
        assert!(files.contains(&IGNORE_FILE.to_string()));
        assert!(!files.contains(&"model.ckpt".to_string()));
        assert!(!files.iter().any(|f| f.starts_with("outputs/")));
    }

    #[test]
    fn test_restrict_to_paths() {
        let files = vec![
            "data/a.csv".to_string(),
            "data/b.csv".to_string(),
            "dataset.py".to_string(),
            "train.py".to_string(),
        ];
        let kept = restrict_to(files.clone(), &[PathBuf::from("data")]).unwrap();
        assert_eq!(kept, vec!["data/a.csv", "data/b.csv"]);

        let kept = restrict_to(files.clone(), &[PathBuf::from("./train.py")]).unwrap();
        assert_eq!(kept, vec!["train.py"]);

        assert!(matches!(
            restrict_to(files.clone(), &[PathBuf::from("missing.txt")]),
            Err(CoreError::PathNotTracked(_))
        ));
        assert_eq!(restrict_to(files.clone(), &[]).unwrap(), files);
    }

    #[test]
    fn test_code_tree_is_content_addressed() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("project");
        write(&project, "a.txt", "same");
        write(&project, "nested/b.txt", "content");
        let repo = Repository::init_bare(tmp.path().join("state")).unwrap();

        let files = tracked_files(&project).unwrap();
        let first = write_code_tree(&repo, &project, &files).unwrap();
        let second = write_code_tree(&repo, &project, &files).unwrap();
        assert_eq!(first, second);

        write(&project, "a.txt", "changed");
        let third = write_code_tree(&repo, &project, &files).unwrap();
        assert_ne!(first, third);
    }
}
