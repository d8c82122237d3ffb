//! Cross-process single-instance lock.
//!
//! A named exclusive file lock in the temp directory. The OS releases it on
//! any termination, clean or not, so a crashed run never wedges later ones.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// Shared identifier all instances contend on. Basically never change this.
pub const SINGLE_INSTANCE_ID: &str = "CLIFp_ONE_INSTANCE";

/// Holds the exclusive lock for the lifetime of the value.
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Try to take the lock. `Ok(None)` means another instance holds it.
    pub fn acquire() -> io::Result<Option<Self>> {
        Self::acquire_named(SINGLE_INSTANCE_ID)
    }

    /// Lock on an arbitrary identifier, mainly for tests.
    pub fn acquire_named(id: &str) -> io::Result<Option<Self>> {
        let path = std::env::temp_dir().join(format!("{id}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "acquired single-instance lock");
                Ok(Some(Self { file, path }))
            }
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "released single-instance lock");
    }
}
