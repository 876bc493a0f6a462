use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::CoreError;

const LOCK_FILE: &str = "prodat.lock";

/// Exclusive advisory lock on the state directory, held for the life of the guard.
pub struct ProjectLock {
    file: File,
}

impl ProjectLock {
    /// Block until the lock is available.
    pub fn acquire(state_dir: &Path) -> Result<Self, CoreError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(state_dir.join(LOCK_FILE))?;
        fs2::FileExt::lock_exclusive(&file).map_err(CoreError::Io)?;
        tracing::trace!("acquired project lock");
        Ok(Self { file })
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_exclusive_until_dropped() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();
        let released = Arc::new(AtomicBool::new(false));

        let guard = ProjectLock::acquire(&dir).unwrap();
        let waiter = {
            let released = Arc::clone(&released);
            std::thread::spawn(move || {
                let _lock = ProjectLock::acquire(&dir).unwrap();
                released.load(Ordering::SeqCst)
            })
        };

        std::thread::sleep(Duration::from_millis(100));
        released.store(true, Ordering::SeqCst);
        drop(guard);
        assert!(waiter.join().unwrap());
    }
}
