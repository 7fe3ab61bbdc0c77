//! StateLock implementations: a lock file for cross-process exclusion and an
//! in-process flag for tests and embedding.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::json_file::parent_dir;
use crate::domain::{BatchError, Result};
use crate::ports::{StateGuard, StateLock};

/// Exclusive OS advisory lock on a lock file.
///
/// The file itself stays on disk; only the lock on the open handle matters.
/// The kernel drops the lock when the holding process exits, so a killed
/// command never blocks the next one.
pub struct FileStateLock {
    path: PathBuf,
}

impl FileStateLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_owner(&self, mut file: &File) {
        // Owner pid, informational only.
        let written = file
            .set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()));
        if let Err(e) = written {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to record lock owner");
        }
    }
}

impl StateLock for FileStateLock {
    fn acquire(&self) -> Result<StateGuard> {
        let dir = parent_dir(&self.path);
        fs::create_dir_all(dir).map_err(|e| BatchError::io(dir, e))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| BatchError::io(&self.path, e))?;
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(BatchError::Locked(self.path.clone())),
            Err(TryLockError::Error(e)) => return Err(BatchError::io(&self.path, e)),
        }
        self.record_owner(&file);

        let path = self.path.clone();
        Ok(StateGuard::new(move || {
            if let Err(e) = file.unlock() {
                tracing::warn!(path = %path.display(), error = %e, "failed to release state lock");
            }
        }))
    }
}

/// Process-local lock.
#[derive(Default)]
pub struct InProcessStateLock {
    held: Arc<AtomicBool>,
}

impl InProcessStateLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl StateLock for InProcessStateLock {
    fn acquire(&self) -> Result<StateGuard> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BatchError::Locked(PathBuf::from("<in-process>")));
        }
        let held = Arc::clone(&self.held);
        Ok(StateGuard::new(move || held.store(false, Ordering::Release)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let lock = FileStateLock::new(dir.path().join("batch_tasks").join(".lock"));

        let guard = lock.acquire().unwrap();
        assert!(lock.path().exists());
        assert!(matches!(lock.acquire(), Err(BatchError::Locked(_))));

        // A second handle on the same path (another process) is refused too.
        let other = FileStateLock::new(lock.path());
        assert!(matches!(other.acquire(), Err(BatchError::Locked(_))));

        drop(guard);
        let _again = other.acquire().unwrap();
    }

    #[test]
    fn lock_file_left_by_a_killed_process_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch_tasks").join(".lock");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        // What a process killed mid-command leaves behind: the file, no lock.
        fs::write(&path, "4194304\n").unwrap();

        let lock = FileStateLock::new(&path);
        let _guard = lock.acquire().unwrap();
        let owner = fs::read_to_string(&path).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }

    #[test]
    fn in_process_lock_is_exclusive_until_dropped() {
        let lock = InProcessStateLock::new();
        let guard = lock.acquire().unwrap();
        assert!(lock.is_held());
        assert!(matches!(lock.acquire(), Err(BatchError::Locked(_))));
        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.acquire().is_ok());
    }
}
