//! Worker-side run loop.
//!
//! Owns the core and its task queue: validates the single-instance lock,
//! binds the install, lets the command enqueue tasks, then pumps the queue in
//! strict FIFO order while honoring cancellation, quit requests, and the
//! stage rules. Shutdown-stage tasks run no matter what came before.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::config::ClifpConfig;
use crate::domain::error::{ClifpError, CoreError, DriverError, ErrorDetails, Severity};
use crate::infrastructure::install::FlashpointInstall;
use crate::infrastructure::process::InstanceLock;
use crate::services::core::{Core, ServicesMode};
use crate::services::director::{Director, Directorate};
use crate::services::task::Task;

/// Requests a frontend can send toward the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Stop the currently running long task, keep the run alive.
    CancelActiveLongTask,
    /// Stop everything except Shutdown-stage tasks.
    Quit,
}

/// Set-once error cell: the first failure decides the exit code.
#[derive(Debug, Default)]
pub struct ErrorStatus {
    first: Option<ErrorDetails>,
}

impl ErrorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `details` unless an earlier error already claimed the cell.
    pub fn set(&mut self, details: ErrorDetails) {
        if self.first.is_none() {
            self.first = Some(details);
        }
    }

    pub fn is_set(&self) -> bool {
        self.first.is_some()
    }

    pub fn details(&self) -> Option<&ErrorDetails> {
        self.first.as_ref()
    }

    pub fn code(&self) -> u32 {
        self.first.as_ref().map_or(0, |d| d.code)
    }
}

/// A parsed subcommand ready to enqueue its tasks.
///
/// Implementations live in the CLI layer; the driver only needs the dispatch
/// surface.
#[async_trait]
pub trait Command: Send {
    fn name(&self) -> &'static str;

    /// Whether the run must bind an archive install first.
    fn requires_flashpoint(&self) -> bool {
        true
    }

    /// Whether the run depends on the archive's background services.
    fn requires_services(&self) -> bool {
        false
    }

    /// Whether this command participates in the single-instance lock.
    fn auto_block_new_instances(&self) -> bool {
        true
    }

    /// Parse the tail, check required options, and enqueue tasks.
    async fn perform(&mut self, core: &mut Core) -> Result<(), ClifpError>;
}

pub struct Driver {
    dirate: Directorate,
    core: Core,
    abort_rx: mpsc::UnboundedReceiver<CoreError>,
    control_rx: mpsc::UnboundedReceiver<ControlRequest>,
    error_status: ErrorStatus,
    quit_requested: bool,
    current_task_number: usize,
    /// Overrides install discovery, mainly for tests.
    install_root_override: Option<PathBuf>,
    instance_id: String,
    _instance_lock: Option<InstanceLock>,
}

impl Driver {
    pub const NAME: &'static str = "driver";

    pub fn new(
        director: Arc<Director>,
        cfg: ClifpConfig,
        control_rx: mpsc::UnboundedReceiver<ControlRequest>,
    ) -> Self {
        let dirate = Directorate::new(Self::NAME, Arc::clone(&director));
        let (core, abort_rx) = Core::new(director, cfg);

        Self {
            dirate,
            core,
            abort_rx,
            control_rx,
            error_status: ErrorStatus::new(),
            quit_requested: false,
            current_task_number: 0,
            install_root_override: None,
            instance_id: crate::infrastructure::process::instance_lock::SINGLE_INSTANCE_ID
                .to_string(),
            _instance_lock: None,
        }
    }

    /// Use `root` instead of walking up from the binary location.
    pub fn with_install_root(mut self, root: PathBuf) -> Self {
        self.install_root_override = Some(root);
        self
    }

    /// Contend on a different lock identifier, mainly for tests.
    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = id.into();
        self
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Run one full invocation and return the process exit code.
    pub async fn drive(mut self, mut command: Box<dyn Command>) -> i32 {
        if let Err(err) = self.prepare(command.as_mut()).await {
            self.record_failure(&err);
            // Shutdown-stage tasks still get their turn.
        }

        self.run_queue().await;
        self.cleanup().await;
        self.finish()
    }

    async fn prepare(&mut self, command: &mut dyn Command) -> Result<(), ClifpError> {
        if command.auto_block_new_instances() {
            match InstanceLock::acquire_named(&self.instance_id) {
                Ok(Some(lock)) => {
                    self.dirate
                        .log_event("Successfully locked standard instance count...");
                    self._instance_lock = Some(lock);
                }
                Ok(None) => return Err(DriverError::AlreadyOpen.into()),
                Err(e) => {
                    tracing::warn!("instance lock error: {e}");
                    return Err(DriverError::AlreadyOpen.into());
                }
            }
        }

        if command.requires_flashpoint() {
            self.bind_install(command.requires_services()).await?;
        }

        command.perform(&mut self.core).await
    }

    async fn bind_install(&mut self, requires_services: bool) -> Result<(), ClifpError> {
        self.dirate.log_event("Searching for Flashpoint root...");

        let root = match self.install_root_override.clone() {
            Some(root) => root,
            None => {
                let exe_dir = std::env::current_exe()
                    .ok()
                    .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
                    .unwrap_or_else(|| PathBuf::from("."));
                FlashpointInstall::find_install_root(&exe_dir).ok_or_else(|| {
                    DriverError::InvalidInstall(
                        "You may need to update (i.e. the 'update' command).".into(),
                    )
                })?
            }
        };

        let install = FlashpointInstall::open(root.clone())
            .await
            .map_err(|e| DriverError::InvalidInstall(e.to_string()))?;
        self.dirate.log_event(&format!(
            "Linked to Flashpoint install at: \"{}\"",
            root.display()
        ));

        let install = Arc::new(install);
        self.core.attach_flashpoint(Arc::clone(&install));

        if requires_services && launcher_running(install.launcher_process_name()) {
            self.core.set_services_mode(ServicesMode::Companion);
            self.core.watch_launcher();
        } else {
            self.core.set_services_mode(ServicesMode::Standalone);
        }

        Ok(())
    }

    async fn run_queue(&mut self) {
        self.dirate.log_event(&format!(
            "{} task(s) to perform",
            self.core.task_count()
        ));
        self.dirate.log_event("Processing Task queue");

        while let Some(mut task) = self.core.take_front_task() {
            self.current_task_number += 1;
            self.drain_pending_controls();

            let skip = (self.error_status.is_set() || self.quit_requested)
                && task.stage() != crate::domain::task::Stage::Shutdown;
            if skip {
                let reason = if self.quit_requested {
                    "Task skipped because the application is quitting"
                } else {
                    "Task skipped due to previous errors"
                };
                self.dirate.log_event(&format!(
                    "{reason}: {} [{}]",
                    task.name(),
                    task.stage()
                ));
                continue;
            }

            self.dirate.log_event(&format!(
                "Handling task {} [{}] ({})",
                self.current_task_number,
                task.stage(),
                task.name()
            ));

            let result = self.run_task(task.as_mut()).await;
            match result {
                Ok(()) => {
                    self.dirate
                        .log_event(&format!("End of task {}", self.current_task_number));
                }
                Err(err) if err.is_cancellation() => {
                    self.dirate.log_event(&format!(
                        "Task {} canceled",
                        self.current_task_number
                    ));
                }
                Err(err) => {
                    self.dirate.log_event(&format!(
                        "Premature end of task {}",
                        self.current_task_number
                    ));
                    self.record_failure(&err);
                }
            }
        }

        self.dirate.log_event("Finished processing Task queue");
    }

    /// Run one task while staying responsive to control and abort messages.
    async fn run_task(&mut self, task: &mut dyn Task) -> Result<(), ClifpError> {
        let stop = task.stop_token();
        let perform = task.perform();
        tokio::pin!(perform);

        // Closed channels are taken out of the race so the task future is the
        // only thing left to poll.
        let mut control_open = true;
        let mut abort_open = true;

        loop {
            tokio::select! {
                result = &mut perform => return result,
                control = self.control_rx.recv(), if control_open => {
                    match control {
                        Some(ControlRequest::CancelActiveLongTask) => {
                            if let Some(stop) = &stop {
                                stop.request();
                            }
                        }
                        Some(ControlRequest::Quit) => {
                            if self.quit_requested {
                                self.dirate.log_event("Received redundant quit request");
                            } else {
                                self.dirate.log_event("Received quit request");
                                self.quit_requested = true;
                            }
                            if let Some(stop) = &stop {
                                stop.request();
                            }
                        }
                        None => control_open = false,
                    }
                }
                abort = self.abort_rx.recv(), if abort_open => {
                    match abort {
                        Some(core_err) => {
                            self.dirate.log_event("Core abort signaled, quitting now.");
                            self.record_failure(&core_err.into());
                            self.quit_requested = true;
                            if let Some(stop) = &stop {
                                stop.request();
                            }
                        }
                        None => abort_open = false,
                    }
                }
            }
        }
    }

    fn drain_pending_controls(&mut self) {
        while let Ok(control) = self.control_rx.try_recv() {
            if control == ControlRequest::Quit && !self.quit_requested {
                self.dirate.log_event("Received quit request");
                self.quit_requested = true;
            }
        }
        while let Ok(core_err) = self.abort_rx.try_recv() {
            self.dirate.log_event("Core abort signaled, quitting now.");
            self.record_failure(&core_err.into());
            self.quit_requested = true;
        }
    }

    fn record_failure(&mut self, err: &ClifpError) {
        if err.is_cancellation() {
            return;
        }
        self.dirate.post_error(err);
        if err.severity() == Severity::Critical {
            self.error_status.set(err.details());
        }
    }

    async fn cleanup(&mut self) {
        self.dirate.log_event("Cleaning up...");
        self.dirate.log_event("Closing deferred processes...");
        self.core.deferred_manager().close_all().await;

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        {
            match crate::infrastructure::update_cache::clear_if_stale(&exe_dir) {
                Ok(true) => self.dirate.log_event("Cleared stale update cache."),
                Ok(false) => {}
                Err(e) => tracing::warn!("failed to clear update cache: {e}"),
            }
        }

        self.dirate.log_event("Finished cleanup");
    }

    fn finish(&mut self) -> i32 {
        self.dirate.log_event("Finishing run...");
        let code = self.error_status.code();
        self.dirate
            .log_event(&format!("Execution finished with code {code}"));
        i32::try_from(code).unwrap_or(i32::MAX)
    }
}

/// One-shot scan for a process by name.
fn launcher_running(name: &str) -> bool {
    use sysinfo::{ProcessesToUpdate, System};

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    let running = system
        .processes_by_name(std::ffi::OsStr::new(name))
        .next()
        .is_some();
    running
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_keeps_first() {
        let mut status = ErrorStatus::new();
        assert!(!status.is_set());
        assert_eq!(status.code(), 0);

        status.set(ErrorDetails::new(120004, Severity::Critical, "first"));
        status.set(ErrorDetails::new(125001, Severity::Critical, "second"));

        assert!(status.is_set());
        assert_eq!(status.code(), 120004);
        assert_eq!(status.details().unwrap().primary, "first");
    }

    #[test]
    fn test_launcher_running_negative() {
        assert!(!launcher_running("clifp-no-such-launcher"));
    }
}
