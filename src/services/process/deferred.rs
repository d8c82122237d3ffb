//! Supervisor for background services that outlive the tasks starting them.
//!
//! A deferred process is owned here exclusively until the Shutdown stage.
//! Unexpected termination while the manager is not closing is reported as a
//! critical error; the shutdown sweep suppresses those reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::domain::directive::AsyncDirective;
use crate::domain::error::{ErrorDetails, Severity};
use crate::services::director::Directorate;
use crate::services::process::blocking::request_graceful_exit;

/// Domain code reported when a managed service dies prematurely.
const PREMATURE_END_CODE: u32 = 123101;

const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

struct Managed {
    close: Arc<Notify>,
    monitor: JoinHandle<()>,
}

/// Set of running background children plus their monitor tasks.
pub struct DeferredProcessManager {
    dirate: Directorate,
    closing: Arc<AtomicBool>,
    managed: Mutex<Vec<Managed>>,
}

impl DeferredProcessManager {
    pub fn new(dirate: Directorate) -> Self {
        Self {
            dirate,
            closing: Arc::new(AtomicBool::new(false)),
            managed: Mutex::new(Vec::new()),
        }
    }

    pub fn managed_count(&self) -> usize {
        self.managed.lock().expect("deferred lock poisoned").len()
    }

    /// Take ownership of a spawned service child.
    pub fn manage(&self, identifier: &str, mut child: Child) {
        let identifier = identifier.to_string();
        let pid = child.id().map_or_else(|| "?".to_string(), |p| p.to_string());
        let dirate = self.dirate.clone();
        let closing = Arc::clone(&self.closing);
        let close = Arc::new(Notify::new());
        let close_signal = Arc::clone(&close);

        if let Some(stdout) = child.stdout.take() {
            spawn_line_logger(stdout, dirate.clone(), identifier.clone(), pid.clone(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_logger(stderr, dirate.clone(), identifier.clone(), pid.clone(), "stderr");
        }

        let monitor = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let status = status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|e| format!("wait failed: {e}"));
                    if closing.load(Ordering::SeqCst) {
                        dirate.log_event(&format!(
                            "Deferred process '{identifier}' ( {pid} ) finished. Status: '{status}'"
                        ));
                    } else {
                        dirate.post_async(AsyncDirective::Error(
                            ErrorDetails::new(
                                PREMATURE_END_CODE,
                                Severity::Critical,
                                format!(
                                    "Deferred process '{identifier}' ( {pid} ) unexpectedly finished."
                                ),
                            )
                            .with_secondary(format!("Status: '{status}'")),
                        ));
                    }
                }
                () = close_signal.notified() => {
                    request_graceful_exit(&child);
                    if timeout(GRACEFUL_EXIT_TIMEOUT, child.wait()).await.is_err() {
                        let _ = child.kill().await;
                    }
                    dirate.log_event(&format!(
                        "Deferred process '{identifier}' ( {pid} ) finished. Status: 'closed'"
                    ));
                }
            }
        });

        self.managed
            .lock()
            .expect("deferred lock poisoned")
            .push(Managed { close, monitor });
    }

    /// End every managed child, suppressing unexpected-termination reports.
    pub async fn close_all(&self) {
        self.closing.store(true, Ordering::SeqCst);

        let managed: Vec<Managed> = self
            .managed
            .lock()
            .expect("deferred lock poisoned")
            .drain(..)
            .collect();

        for entry in &managed {
            entry.close.notify_one();
        }
        for entry in managed {
            let _ = entry.monitor.await;
        }

        self.closing.store(false, Ordering::SeqCst);
    }
}

fn spawn_line_logger<R>(
    reader: R,
    dirate: Directorate,
    identifier: String,
    pid: String,
    stream: &'static str,
) where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            dirate.log_event(&format!("'{identifier}' ( {pid} ) <{stream}> {line}"));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::{Directive, Director};
    use std::process::Stdio;

    fn spawn_sh(script: &str) -> Child {
        tokio::process::Command::new("sh")
            .args(["-c", script])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn test_premature_exit_reports_critical_error() {
        let (director, mut rx) = Director::new(Verbosity::Full);
        let manager = DeferredProcessManager::new(Directorate::new("deferred", director));

        manager.manage("flaky-service", spawn_sh("exit 3"));

        // The monitor should post exactly one critical error directive.
        let directive = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        match directive {
            Directive::Async {
                payload: AsyncDirective::Error(details),
                ..
            } => {
                assert_eq!(details.code, PREMATURE_END_CODE);
                assert_eq!(details.severity, Severity::Critical);
                assert!(details.primary.contains("flaky-service"));
            }
            other => panic!("unexpected directive {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_all_suppresses_reports() {
        let (director, mut rx) = Director::new(Verbosity::Full);
        let manager = DeferredProcessManager::new(Directorate::new("deferred", director));

        manager.manage("service", spawn_sh("sleep 30"));
        assert_eq!(manager.managed_count(), 1);

        manager.close_all().await;
        assert_eq!(manager.managed_count(), 0);

        // No error directive: only the close log line went through tracing.
        assert!(rx.try_recv().is_err());
    }
}
