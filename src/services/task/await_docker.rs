//! Wait for a docker-backed game server container to be running.
//!
//! Direct-queries the container state first; if it is not yet up, subscribes
//! to the docker event stream and waits for a start event within the timeout,
//! then re-queries once before giving up.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::domain::error::{AwaitDockerError, ClifpError};
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::task::{StopToken, Task};

const DOCKER: &str = "docker";

pub struct TAwaitDocker {
    dirate: Directorate,
    stage: Stage,
    stop: StopToken,
    image_name: String,
    timeout: Duration,
}

impl TAwaitDocker {
    pub const NAME: &'static str = "TAwaitDocker";

    pub fn new(
        dirate: Directorate,
        stage: Stage,
        image_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            dirate,
            stage,
            stop: StopToken::new(),
            image_name: image_name.into(),
            timeout,
        }
    }

    async fn image_running(&self) -> Result<bool, AwaitDockerError> {
        self.dirate.log_event(&format!(
            "Checking if docker image '{}' is running directly",
            self.image_name
        ));

        let output = tokio::process::Command::new(DOCKER)
            .args([
                "ps",
                "--filter",
                &format!("name={}", self.image_name),
                "--format",
                "{{.Names}}",
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AwaitDockerError::DirectQueryFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(AwaitDockerError::DirectQueryFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let names = String::from_utf8_lossy(&output.stdout);
        Ok(names.lines().any(|name| name.trim() == self.image_name))
    }

    async fn await_start_event(&self) -> Result<bool, ClifpError> {
        self.dirate
            .log_event("Docker image isn't running, starting listener...");

        let mut listener = tokio::process::Command::new(DOCKER)
            .args([
                "events",
                "--filter",
                &format!("container={}", self.image_name),
                "--filter",
                "event=start",
                "--format",
                "{{.Status}}",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AwaitDockerError::ListenFailed(e.to_string()))?;

        let stdout = listener
            .stdout
            .take()
            .ok_or_else(|| AwaitDockerError::ListenFailed("no event stream".into()))?;
        let mut lines = BufReader::new(stdout).lines();

        let started = tokio::select! {
            line = tokio::time::timeout(self.timeout, lines.next_line()) => {
                match line {
                    Ok(Ok(Some(_))) => {
                        self.dirate.log_event("Received docker image start event");
                        true
                    }
                    // Listener ended or errored without an event.
                    Ok(_) => false,
                    // Timed out; the final re-query decides.
                    Err(_) => false,
                }
            }
            () = self.stop.triggered() => {
                self.dirate.log_event("Stopping event listener...");
                let _ = listener.kill().await;
                return Err(ClifpError::Cancelled);
            }
        };

        self.dirate.log_event("Stopping event listener...");
        let _ = listener.kill().await;
        Ok(started)
    }
}

#[async_trait]
impl Task for TAwaitDocker {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![
            format!(".image_name = \"{}\"", self.image_name),
            format!(".timeout = {}ms", self.timeout.as_millis()),
        ]
    }

    fn stop_token(&self) -> Option<StopToken> {
        Some(self.stop.clone())
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        if self.image_running().await? {
            return Ok(());
        }

        if self.await_start_event().await? {
            return Ok(());
        }

        // The event may have fired between the query and the subscription.
        if self.image_running().await? {
            self.dirate
                .log_event("The docker image was found to be running after the final timeout check");
            return Ok(());
        }

        Err(AwaitDockerError::StartFailed(self.image_name.clone()).into())
    }
}
