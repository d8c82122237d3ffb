//! Poll-then-wait on a named external process.
//!
//! State machine: Grace (polling for the process to appear) then Waiting
//! (polling for it to terminate). The watched pid is published so a caller can
//! request termination of the found process from another context.

use std::ffi::OsStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::domain::error::BiderError;
use crate::domain::task::BideOutcome;

/// Watches for a process by name and waits on its lifetime.
pub struct ProcessBider {
    process_name: String,
    respawn_grace: Duration,
    poll_rate: Duration,
    system: Mutex<System>,
    watched_pid: Arc<AtomicU32>,
}

impl ProcessBider {
    pub fn new(process_name: impl Into<String>, respawn_grace: Duration, poll_rate: Duration) -> Self {
        Self {
            process_name: process_name.into(),
            respawn_grace,
            poll_rate,
            system: Mutex::new(System::new()),
            watched_pid: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Pid currently being waited on, once one was sighted.
    pub fn watched_pid(&self) -> Option<u32> {
        match self.watched_pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    fn find_process(&self) -> Option<u32> {
        let mut system = self.system.lock().expect("bider system poisoned");
        system.refresh_processes(ProcessesToUpdate::All, true);
        let pid = system
            .processes_by_name(OsStr::new(&self.process_name))
            .next()
            .map(|p| p.pid().as_u32());
        pid
    }

    fn pid_alive(&self, pid: u32) -> bool {
        let mut system = self.system.lock().expect("bider system poisoned");
        system.refresh_processes(ProcessesToUpdate::All, true);
        system.process(Pid::from_u32(pid)).is_some()
    }

    /// Run the full bide: grace window, then wait for termination.
    pub async fn bide(&self) -> Result<BideOutcome, BiderError> {
        debug!(
            process = %self.process_name,
            grace_ms = self.respawn_grace.as_millis() as u64,
            "waiting for process to be running"
        );

        let deadline = Instant::now() + self.respawn_grace;
        let pid = loop {
            if let Some(pid) = self.find_process() {
                break pid;
            }
            if Instant::now() >= deadline {
                debug!(process = %self.process_name, "process was not running after the grace period");
                return Ok(BideOutcome::NeverRan);
            }
            sleep(self.poll_rate).await;
        };

        self.watched_pid.store(pid, Ordering::SeqCst);
        debug!(process = %self.process_name, pid, "wait-on process is running");

        while self.pid_alive(pid) {
            sleep(self.poll_rate).await;
        }

        debug!(process = %self.process_name, pid, "wait-on process has finished");
        Ok(BideOutcome::Ran)
    }

    /// Ask the watched process to terminate so the wait can conclude.
    pub fn close_watched_process(&self) -> Result<(), BiderError> {
        let Some(pid) = self.watched_pid() else {
            return Err(BiderError::Close("no process is being waited on".into()));
        };

        let mut system = self.system.lock().expect("bider system poisoned");
        system.refresh_processes(ProcessesToUpdate::All, true);
        match system.process(Pid::from_u32(pid)) {
            Some(process) => {
                if process.kill() {
                    Ok(())
                } else {
                    Err(BiderError::Close(format!("kill of pid {pid} failed")))
                }
            }
            // Already gone counts as closed.
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_never_ran_after_grace() {
        let bider = ProcessBider::new(
            "clifp-definitely-not-a-process",
            Duration::from_millis(50),
            Duration::from_millis(10),
        );
        let outcome = bider.bide().await.unwrap();
        assert_eq!(outcome, BideOutcome::NeverRan);
        assert_eq!(bider.watched_pid(), None);
    }

    #[tokio::test]
    async fn test_close_without_sighting_is_error() {
        let bider = ProcessBider::new(
            "clifp-definitely-not-a-process",
            Duration::from_millis(10),
            Duration::from_millis(10),
        );
        assert!(matches!(
            bider.close_watched_process(),
            Err(BiderError::Close(_))
        ));
    }

    #[tokio::test]
    async fn test_bides_on_real_process() {
        // Spawn a short sleep and bide on it by name.
        let mut child = tokio::process::Command::new("sleep")
            .arg("0.4")
            .spawn()
            .expect("spawn sleep");

        let bider = ProcessBider::new(
            "sleep",
            Duration::from_secs(2),
            Duration::from_millis(25),
        );
        let outcome = bider.bide().await.unwrap();
        assert_eq!(outcome, BideOutcome::Ran);

        let _ = child.wait().await;
    }
}
