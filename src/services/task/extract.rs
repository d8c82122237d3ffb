//! Data pack extraction.
//!
//! Extracts one sub-directory of a zip archive (packs keep their payload under
//! `content/`) into a destination directory, creating paths as needed.

use async_trait::async_trait;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::error::{ClifpError, ExtractError};
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::task::Task;

/// Payload folder inside a data pack.
pub const PACK_CONTENT_DIR: &str = "content";

pub struct TExtract {
    dirate: Directorate,
    stage: Stage,
    archive_path: PathBuf,
    /// Archive-internal folder to pull out, empty for the whole archive.
    sub_path: String,
    destination: PathBuf,
}

impl TExtract {
    pub const NAME: &'static str = "TExtract";

    pub fn new(
        dirate: Directorate,
        stage: Stage,
        archive_path: PathBuf,
        sub_path: impl Into<String>,
        destination: PathBuf,
    ) -> Self {
        Self {
            dirate,
            stage,
            archive_path,
            sub_path: sub_path.into(),
            destination,
        }
    }
}

pub(crate) fn extract_sub_dir(
    archive_path: &Path,
    sub_path: &str,
    destination: &Path,
) -> Result<usize, ExtractError> {
    let file =
        File::open(archive_path).map_err(|e| ExtractError::OpenArchive(e.to_string()))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ExtractError::GeneralZip(e.to_string()))?;

    let prefix = if sub_path.is_empty() {
        String::new()
    } else {
        format!("{}/", sub_path.trim_matches('/'))
    };

    let mut extracted = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ExtractError::OpenFile(e.to_string()))?;

        let Some(enclosed) = entry.enclosed_name() else {
            continue;
        };
        let enclosed = enclosed.to_string_lossy().into_owned();
        let Some(relative) = enclosed.strip_prefix(&prefix) else {
            continue;
        };
        if relative.is_empty() {
            continue;
        }

        let out_path = destination.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| ExtractError::MakePath(e.to_string()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ExtractError::MakePath(e.to_string()))?;
        }
        let mut out_file =
            File::create(&out_path).map_err(|e| ExtractError::WriteFile(e.to_string()))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| ExtractError::WriteFile(e.to_string()))?;
        extracted += 1;
    }

    Ok(extracted)
}

#[async_trait]
impl Task for TExtract {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![
            format!(".archive_path = \"{}\"", self.archive_path.display()),
            format!(".sub_path = \"{}\"", self.sub_path),
            format!(".destination = \"{}\"", self.destination.display()),
        ]
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        self.dirate.log_event(&format!(
            "Extracting Data Pack {}",
            self.archive_path.display()
        ));

        let archive_path = self.archive_path.clone();
        let sub_path = self.sub_path.clone();
        let destination = self.destination.clone();

        let extracted = tokio::task::spawn_blocking(move || {
            extract_sub_dir(&archive_path, &sub_path, &destination)
        })
        .await
        .map_err(|e| ExtractError::GeneralZip(e.to_string()))??;

        self.dirate
            .log_event(&format!("Extracted {extracted} file(s)"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::Director;
    use std::io::Write;

    fn build_pack(path: &Path) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();

        writer.add_directory("content/", options).unwrap();
        writer.start_file("content/index.html", options).unwrap();
        writer.write_all(b"<html>game</html>").unwrap();
        writer
            .add_directory("content/assets/", options)
            .unwrap();
        writer.start_file("content/assets/game.swf", options).unwrap();
        writer.write_all(b"FWS...").unwrap();
        writer.start_file("metadata.json", options).unwrap();
        writer.write_all(b"{}").unwrap();
        writer.finish().unwrap();
    }

    fn extractor(archive: &Path, dest: &Path) -> TExtract {
        let (director, _rx) = Director::new(Verbosity::Silent);
        TExtract::new(
            Directorate::new(TExtract::NAME, director),
            Stage::Primary,
            archive.to_path_buf(),
            PACK_CONTENT_DIR,
            dest.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn test_extracts_only_content_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        build_pack(&archive);

        let dest = dir.path().join("htdocs");
        extractor(&archive, &dest).perform().await.unwrap();

        assert_eq!(
            std::fs::read(dest.join("index.html")).unwrap(),
            b"<html>game</html>"
        );
        assert!(dest.join("assets/game.swf").is_file());
        // Entries outside the sub path stay behind.
        assert!(!dest.join("metadata.json").exists());
    }

    #[tokio::test]
    async fn test_missing_archive_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let err = extractor(&dir.path().join("absent.zip"), &dir.path().join("out"))
            .perform()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClifpError::Extract(ExtractError::OpenArchive(_))
        ));
    }

    #[tokio::test]
    async fn test_garbage_archive_fails_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("junk.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extractor(&archive, &dir.path().join("out"))
            .perform()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClifpError::Extract(ExtractError::GeneralZip(_))
        ));
    }
}
