//! Exclusive advisory lock on a sidecar `.lock` file.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// A file lock guard that releases the lock when dropped.
///
/// The lock lives on `<path>.lock`, not on the data file itself, so the data
/// file can be replaced by rename while the lock is held.
#[derive(Debug)]
pub struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    /// Blocks until an exclusive lock for `path` is held.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);

        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()?;
        }

        Ok(FileLock { file, lock_path })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Unlock happens when the handle closes; the sidecar is left in place
        // so a waiting process never locks a file that was just unlinked.
        #[cfg(unix)]
        {
            use fs2::FileExt;
            let _ = self.file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_creates_sidecar_next_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("history.jsonl");

        let lock = FileLock::acquire(&data).unwrap();

        assert_eq!(lock.lock_path(), temp_dir.path().join("history.jsonl.lock"));
        assert!(lock.lock_path().exists());
    }

    #[test]
    fn test_lock_can_be_reacquired_after_drop() {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("config.toml");

        drop(FileLock::acquire(&data).unwrap());
        assert!(FileLock::acquire(&data).is_ok());
    }
}
