//! Single-instance cross-process lock
//!
//! An exclusive OS-level file lock guards the catalog file against
//! overlapping refresh runs. Contention is fatal and aborts before
//! any write; the lock is released on every exit path via Drop.

use crate::error::{RefreshError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

#[derive(Debug)]
pub struct SingleInstanceLock {
    file: File,
    path: String,
}

impl SingleInstanceLock {
    /// Acquire the lock without blocking. Failure means another
    /// refresh run currently owns the catalog.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(RefreshError::LockHeld(path.display().to_string()));
        }

        // Best effort breadcrumb for operators inspecting a stale lock.
        let _ = file.set_len(0);
        let _ = writeln!(
            file,
            "LockedAtUtc={}\nPid={}",
            crate::catalog::utc_now_iso(),
            std::process::id()
        );
        let _ = file.flush();

        Ok(Self {
            file,
            path: path.display().to_string(),
        })
    }
}

impl Drop for SingleInstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            log::warn!("Failed to release lock {}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("refresher.lock");

        let lock = SingleInstanceLock::acquire(&path).unwrap();
        drop(lock);

        // Released lock can be re-acquired.
        let _lock = SingleInstanceLock::acquire(&path).unwrap();
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("refresher.lock");

        let _held = SingleInstanceLock::acquire(&path).unwrap();
        match SingleInstanceLock::acquire(&path) {
            Err(RefreshError::LockHeld(p)) => assert!(p.contains("refresher.lock")),
            other => panic!("Expected LockHeld, got: {other:?}"),
        }
    }

    #[test]
    fn lock_file_contains_pid() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("refresher.lock");

        let _lock = SingleInstanceLock::acquire(&path).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("Pid="));
        assert!(body.contains("LockedAtUtc="));
    }

    #[test]
    fn creates_parent_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/refresher.lock");
        let _lock = SingleInstanceLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
}
