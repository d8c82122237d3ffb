//! Ultimate-edition games store accessor.
//!
//! Ultimate installs carry every data pack in a local store, so a missing or
//! corrupt pack in the active data packs folder can be restored from there
//! instead of downloaded.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::domain::error::ArchiveError;

/// Store location relative to the install root.
pub const GAMES_STORE_PATH: &str = "Data/Games";

/// Read access to the local games store.
pub struct ArchiveAccess {
    store_dir: PathBuf,
}

impl ArchiveAccess {
    pub fn new(install_root: &Path) -> Self {
        Self {
            store_dir: install_root.join(GAMES_STORE_PATH),
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Copy `file_name` out of the store into `dest`, verifying its digest.
    pub async fn source_pack(
        &self,
        file_name: &str,
        expected_sha256: &str,
        dest: &Path,
    ) -> Result<(), ArchiveError> {
        let source = self.store_dir.join(file_name);
        if !source.is_file() {
            return Err(ArchiveError::PackNotFound(file_name.to_string()));
        }

        let digest = hash_file(&source)
            .await
            .map_err(|e| ArchiveError::ReadFailed(e.to_string()))?;
        if !digest.eq_ignore_ascii_case(expected_sha256) {
            return Err(ArchiveError::PackCorrupt(file_name.to_string()));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArchiveError::ReadFailed(e.to_string()))?;
        }
        tokio::fs::copy(&source, dest)
            .await
            .map_err(|e| ArchiveError::ReadFailed(e.to_string()))?;

        info!(pack = file_name, "sourced data pack from the games store");
        Ok(())
    }
}

/// Streamed SHA-256 of a file, lowercase hex.
pub async fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn written_hash(bytes: &[u8]) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.bin");
        tokio::fs::write(&path, bytes).await.unwrap();
        hash_file(&path).await.unwrap()
    }

    #[tokio::test]
    async fn test_hash_file_known_vector() {
        // sha256 of the empty string
        assert_eq!(
            written_hash(b"").await,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_source_pack_missing() {
        let dir = tempfile::tempdir().unwrap();
        let access = ArchiveAccess::new(dir.path());
        let err = access
            .source_pack("nope.zip", "00", &dir.path().join("out.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::PackNotFound(_)));
    }

    #[tokio::test]
    async fn test_source_pack_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join(GAMES_STORE_PATH);
        std::fs::create_dir_all(&store).unwrap();
        std::fs::write(store.join("pack.zip"), b"pack-bytes").unwrap();

        let access = ArchiveAccess::new(dir.path());
        let err = access
            .source_pack("pack.zip", "deadbeef", &dir.path().join("out.zip"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::PackCorrupt(_)));
    }

    #[tokio::test]
    async fn test_source_pack_copies_on_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join(GAMES_STORE_PATH);
        std::fs::create_dir_all(&store).unwrap();
        std::fs::write(store.join("pack.zip"), b"pack-bytes").unwrap();

        let expected = hash_file(&store.join("pack.zip")).await.unwrap();
        assert_eq!(expected.len(), 64);

        let dest = dir.path().join("packs/out.zip");
        let access = ArchiveAccess::new(dir.path());
        access.source_pack("pack.zip", &expected, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"pack-bytes");
    }

    #[tokio::test]
    async fn test_source_pack_hash_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join(GAMES_STORE_PATH);
        std::fs::create_dir_all(&store).unwrap();
        std::fs::write(store.join("pack.zip"), b"pack-bytes").unwrap();

        let expected = hash_file(&store.join("pack.zip")).await.unwrap().to_uppercase();
        let dest = dir.path().join("out.zip");
        let access = ArchiveAccess::new(dir.path());
        access.source_pack("pack.zip", &expected, &dest).await.unwrap();
    }
}
