//! Supervisor for a child whose exit drives task completion.

use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::services::director::Directorate;

/// How long a child gets to exit gracefully before being killed.
const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns one blocking child, logging its output line by line.
pub struct BlockingProcessManager {
    child: Child,
    identifier: String,
    pid: Option<u32>,
    io_loggers: Vec<JoinHandle<()>>,
}

impl BlockingProcessManager {
    /// Take ownership of a spawned child and begin streaming its output.
    pub fn new(mut child: Child, identifier: impl Into<String>, dirate: &Directorate) -> Self {
        let identifier = identifier.into();
        let pid = child.id();
        let mut io_loggers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            io_loggers.push(spawn_line_logger(
                stdout,
                dirate.clone(),
                identifier.clone(),
                pid,
                "stdout",
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            io_loggers.push(spawn_line_logger(
                stderr,
                dirate.clone(),
                identifier.clone(),
                pid,
                "stderr",
            ));
        }

        Self {
            child,
            identifier,
            pid,
            io_loggers,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the child to exit on its own.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.drain_loggers().await;
        Ok(status)
    }

    /// Request graceful termination, escalating to a kill after a timeout.
    pub async fn close(&mut self) {
        request_graceful_exit(&self.child);

        if timeout(GRACEFUL_EXIT_TIMEOUT, self.child.wait()).await.is_err() {
            let _ = self.child.kill().await;
        }
        self.drain_loggers().await;
    }

    async fn drain_loggers(&mut self) {
        for logger in self.io_loggers.drain(..) {
            let _ = logger.await;
        }
    }
}

/// Ask the child to exit without force.
#[cfg(unix)]
pub(crate) fn request_graceful_exit(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
pub(crate) fn request_graceful_exit(_child: &Child) {
    // No portable graceful signal; the kill escalation handles it.
}

fn spawn_line_logger<R>(
    reader: R,
    dirate: Directorate,
    identifier: String,
    pid: Option<u32>,
    stream: &'static str,
) -> JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let pid = pid.map_or_else(|| "?".to_string(), |p| p.to_string());
        while let Ok(Some(line)) = lines.next_line().await {
            dirate.log_event(&format!("'{identifier}' ( {pid} ) <{stream}> {line}"));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::Director;
    use std::process::Stdio;

    fn test_directorate() -> Directorate {
        let (director, _rx) = Director::new(Verbosity::Full);
        Directorate::new("test", director)
    }

    #[tokio::test]
    async fn test_wait_collects_exit_status() {
        let child = tokio::process::Command::new("sh")
            .args(["-c", "echo out; exit 7"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let mut manager = BlockingProcessManager::new(child, "probe", &test_directorate());
        let status = manager.wait().await.unwrap();
        assert_eq!(status.code(), Some(7));
    }

    #[tokio::test]
    async fn test_close_terminates_lingering_child() {
        let child = tokio::process::Command::new("sleep")
            .arg("30")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let mut manager = BlockingProcessManager::new(child, "lingerer", &test_directorate());
        let started = std::time::Instant::now();
        manager.close().await;
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
