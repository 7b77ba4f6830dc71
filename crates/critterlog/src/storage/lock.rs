//! Advisory locking for the sighting file.

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;
use tracing::trace;

use crate::error::{Error, Result};

/// Holds an advisory lock on the sidecar lock file until dropped.
#[derive(Debug)]
pub(super) struct FileLock {
    file: File,
}

impl FileLock {
    /// Block until a shared (reader) lock is held.
    pub(super) fn shared(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_shared(&file).map_err(|source| Error::StoreLock {
            path: path.to_path_buf(),
            source,
        })?;
        trace!("Shared lock acquired on {}", path.display());
        Ok(Self { file })
    }

    /// Block until an exclusive (writer) lock is held.
    pub(super) fn exclusive(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        FileExt::lock_exclusive(&file).map_err(|source| Error::StoreLock {
            path: path.to_path_buf(),
            source,
        })?;
        trace!("Exclusive lock acquired on {}", path.display());
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| Error::StoreLock {
            path: path.to_path_buf(),
            source,
        })
}
