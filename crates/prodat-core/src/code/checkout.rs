use std::collections::HashSet;
use std::path::Path;

use git2::{ObjectType, Oid, Repository};
use serde::Serialize;

use crate::error::CoreError;
use crate::model::TrackedFile;
use crate::storage::objects::read_blob;

/// What a checkout did to the working tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckoutSummary {
    pub written: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Make the working tree match `target`.
///
/// `current` is the list of tracked files before checkout. Tracked files
/// absent from `target` are deleted; untracked and ignored files are never
/// touched. Files whose content already matches are left alone.
pub fn restore_files(
    repo: &Repository,
    root: &Path,
    current: &[String],
    target: &[TrackedFile],
) -> Result<CheckoutSummary, CoreError> {
    let mut summary = CheckoutSummary::default();
    let wanted: HashSet<&str> = target.iter().map(|f| f.path.as_str()).collect();

    for rel in current {
        if wanted.contains(rel.as_str()) {
            continue;
        }
        let abs = root.join(rel);
        match std::fs::remove_file(&abs) {
            Ok(()) => {
                summary.removed += 1;
                prune_empty_dirs(root, &abs);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CoreError::Io(e)),
        }
    }

    for file in target {
        let abs = root.join(&file.path);
        let expected = Oid::from_str(&file.blob)?;
        let matches = abs.is_file()
            && Oid::hash_file(ObjectType::Blob, &abs).ok() == Some(expected);

        if matches {
            summary.unchanged += 1;
        } else {
            if let Some(parent) = abs.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = read_blob(repo, &file.blob)?;
            std::fs::write(&abs, content)?;
            summary.written += 1;
        }
        set_executable(&abs, file.executable)?;
    }

    tracing::debug!(
        written = summary.written,
        removed = summary.removed,
        unchanged = summary.unchanged,
        "restored working tree"
    );
    Ok(summary)
}

/// Remove now-empty directories between `removed_file` and `root`.
fn prune_empty_dirs(root: &Path, removed_file: &Path) {
    let mut dir = removed_file.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        // Fails on non-empty directories, which ends the walk.
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

#[cfg(unix)]
fn set_executable(path: &Path, executable: bool) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    let mode = perms.mode();
    let new_mode = if executable {
        mode | 0o111
    } else {
        mode & !0o111
    };
    if new_mode != mode {
        perms.set_mode(new_mode);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path, _executable: bool) -> Result<(), CoreError> {
    Ok(())
}
