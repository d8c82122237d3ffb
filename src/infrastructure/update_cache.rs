//! Self-update staging area.
//!
//! A cache directory sibling to the binary holding the downloaded release,
//! its unpacked tree, and backups of the replaced files. After a successful
//! swap the cache is marked stale and cleared on the next run, unless a
//! diagnostic flag keeps it around.

use std::io;
use std::path::{Path, PathBuf};

pub const CACHE_DIR_NAME: &str = "update_cache";
const STALE_MARKER: &str = ".stale";

/// Environment flag that prevents automatic cache clearing.
pub const KEEP_CACHE_ENV: &str = "CLIFP_KEEP_UPDATE_CACHE";

pub fn cache_root(exe_dir: &Path) -> PathBuf {
    exe_dir.join(CACHE_DIR_NAME)
}

pub fn download_dir(exe_dir: &Path) -> PathBuf {
    cache_root(exe_dir).join("download")
}

pub fn data_dir(exe_dir: &Path) -> PathBuf {
    cache_root(exe_dir).join("data")
}

pub fn backup_dir(exe_dir: &Path) -> PathBuf {
    cache_root(exe_dir).join("backup")
}

/// Flag the cache for removal on the next run.
pub fn mark_stale(exe_dir: &Path) -> io::Result<()> {
    std::fs::write(cache_root(exe_dir).join(STALE_MARKER), b"")
}

pub fn is_stale(exe_dir: &Path) -> bool {
    cache_root(exe_dir).join(STALE_MARKER).exists()
}

/// Remove a stale cache. Returns whether anything was cleared.
pub fn clear_if_stale(exe_dir: &Path) -> io::Result<bool> {
    if std::env::var_os(KEEP_CACHE_ENV).is_some() {
        return Ok(false);
    }
    if !is_stale(exe_dir) {
        return Ok(false);
    }
    std::fs::remove_dir_all(cache_root(exe_dir))?;
    Ok(true)
}

/// Remove the cache unconditionally.
pub fn clear(exe_dir: &Path) -> io::Result<()> {
    let root = cache_root(exe_dir);
    if root.exists() {
        std::fs::remove_dir_all(root)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_cache_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(download_dir(dir.path())).unwrap();
        assert!(!is_stale(dir.path()));
        assert!(!clear_if_stale(dir.path()).unwrap());
        assert!(cache_root(dir.path()).exists());

        mark_stale(dir.path()).unwrap();
        assert!(is_stale(dir.path()));
        assert!(clear_if_stale(dir.path()).unwrap());
        assert!(!cache_root(dir.path()).exists());
    }

    #[test]
    fn test_clear_missing_cache_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        clear(dir.path()).unwrap();
    }
}
