//! Data pack download with streamed SHA-256 verification.

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ClifpError, DownloadError};
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::task::{StopToken, Task};

pub struct TDownload {
    dirate: Directorate,
    stage: Stage,
    stop: StopToken,
    destination_dir: PathBuf,
    destination_filename: String,
    target_url: String,
    sha256: String,
    /// Idle timeout: maximum gap between received chunks.
    idle_timeout: Duration,
}

impl TDownload {
    pub const NAME: &'static str = "TDownload";

    pub fn new(
        dirate: Directorate,
        stage: Stage,
        destination_dir: PathBuf,
        destination_filename: impl Into<String>,
        target_url: impl Into<String>,
        sha256: impl Into<String>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            dirate,
            stage,
            stop: StopToken::new(),
            destination_dir,
            destination_filename: destination_filename.into(),
            target_url: target_url.into(),
            sha256: sha256.into(),
            idle_timeout,
        }
    }

    pub fn destination(&self) -> PathBuf {
        self.destination_dir.join(&self.destination_filename)
    }

    async fn transfer(&self) -> Result<(), ClifpError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.idle_timeout)
            .build()
            .map_err(|e| DownloadError::Incomplete(e.to_string()))?;

        let response = client
            .get(&self.target_url)
            .send()
            .await
            .map_err(|e| DownloadError::Incomplete(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.dirate
                .log_event("Data Pack download unexpectedly requires authentication");
            return Err(DownloadError::Incomplete("authentication required".into()).into());
        }
        if !response.status().is_success() {
            return Err(DownloadError::Incomplete(format!(
                "server responded {}",
                response.status()
            ))
            .into());
        }

        if let Some(total) = response.content_length() {
            self.dirate
                .post_async(AsyncDirective::ProcedureScale { max: total });
        }

        tokio::fs::create_dir_all(&self.destination_dir)
            .await
            .map_err(|e| DownloadError::Incomplete(e.to_string()))?;

        let final_path = self.destination();
        let part_path = final_path.with_extension("part");
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| DownloadError::Incomplete(e.to_string()))?;

        let mut hasher = Sha256::new();
        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();

        let outcome = loop {
            let next = tokio::select! {
                chunk = tokio::time::timeout(self.idle_timeout, stream.next()) => chunk,
                () = self.stop.triggered() => {
                    self.dirate.log_event("Stopping current download(s)...");
                    break Err(ClifpError::Cancelled);
                }
            };

            match next {
                Err(_) => {
                    break Err(DownloadError::Incomplete("transfer idle timeout".into()).into());
                }
                Ok(None) => break Ok(()),
                Ok(Some(Err(e))) => {
                    break Err(DownloadError::Incomplete(e.to_string()).into());
                }
                Ok(Some(Ok(bytes))) => {
                    hasher.update(&bytes);
                    if let Err(e) = file.write_all(&bytes).await {
                        break Err(DownloadError::Incomplete(e.to_string()).into());
                    }
                    received += bytes.len() as u64;
                    self.dirate
                        .post_async(AsyncDirective::ProcedureProgress { current: received });
                }
            }
        };

        if let Err(err) = outcome {
            drop(file);
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(err);
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::Incomplete(e.to_string()))?;
        drop(file);

        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(|e| DownloadError::Incomplete(e.to_string()))?;

        let digest = format!("{:x}", hasher.finalize());
        if !digest.eq_ignore_ascii_case(&self.sha256) {
            return Err(DownloadError::ChecksumMismatch.into());
        }

        Ok(())
    }
}

#[async_trait]
impl Task for TDownload {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![
            format!(".target_url = \"{}\"", self.target_url),
            format!(".destination = \"{}\"", self.destination().display()),
            format!(".sha256 = {}", self.sha256),
        ]
    }

    fn stop_token(&self) -> Option<StopToken> {
        Some(self.stop.clone())
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        self.dirate
            .log_event(&format!("Downloading Data Pack {}", self.target_url));
        self.dirate.post_async(AsyncDirective::ProcedureStart {
            label: format!("Downloading {}", self.destination_filename),
        });

        let result = self.transfer().await;

        self.dirate.post_async(AsyncDirective::ProcedureStop);
        if result.is_ok() {
            self.dirate.log_event("Data Pack downloaded successfully");
        }
        result
    }
}
