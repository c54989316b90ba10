//! Single-writer lock on an output directory.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Exclusive advisory lock held for the lifetime of the guard.
#[derive(Debug)]
pub struct OutputLock {
    path: PathBuf,
    file: File,
}

impl OutputLock {
    pub const FILE_NAME: &'static str = ".husl.lock";

    /// Lock `out_dir`, creating it when needed. Fails with
    /// [`CoreError::Locked`] when another run holds the lock.
    pub fn acquire(out_dir: &Path) -> CoreResult<Self> {
        fs::create_dir_all(out_dir).map_err(|e| CoreError::io(out_dir, e))?;
        let path = out_dir.join(Self::FILE_NAME);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| CoreError::io(&path, e))?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(CoreError::Locked(out_dir.to_path_buf()));
            }
            return Err(CoreError::io(&path, e));
        }

        debug!("Acquired output lock {:?}", path);
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!("Released output lock {:?}", self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_second_acquire_is_refused() {
        let temp = tempdir().unwrap();
        let out = temp.path().join("out");

        let lock = OutputLock::acquire(&out).unwrap();
        assert!(lock.path().ends_with(OutputLock::FILE_NAME));
        assert!(matches!(OutputLock::acquire(&out), Err(CoreError::Locked(_))));

        drop(lock);
        assert!(OutputLock::acquire(&out).is_ok());
    }
}
