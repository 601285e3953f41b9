//! Run lock - one `migrate` at a time per project
//!
//! Advisory lock on a file in the state directory (flock on Unix,
//! LockFileEx on Windows). Only cooperating sqlmig processes see it; it
//! does nothing against other tools writing to the same database.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

use crate::domain::result::{Error, Result};

/// Held exclusive lock. Released when dropped.
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

impl RunLock {
    /// Take the lock without waiting
    ///
    /// Fails with `Error::Locked` if another process holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::filesystem(path, e))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file }),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
                Err(Error::Locked(path.to_path_buf()))
            }
            Err(e) => Err(Error::filesystem(path, e)),
        }
    }

}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".sqlmig").join("migrate.lock");

        let _held = RunLock::acquire(&path).unwrap();
        let err = RunLock::acquire(&path).unwrap_err();

        assert!(matches!(err, Error::Locked(ref p) if p == &path));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("migrate.lock");

        drop(RunLock::acquire(&path).unwrap());

        assert!(RunLock::acquire(&path).is_ok());
    }
}
