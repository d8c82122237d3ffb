//! Primary title launch.
//!
//! A `TExec` specialization for the main title process. On Windows, launcher
//! executables are often short-lived shims that hand off to a helper process,
//! so after the child exits the task bides on that helper to keep the
//! pipeline alive as long as the title actually runs. Elsewhere the child is
//! the title, and no bide is needed.

use async_trait::async_trait;

use crate::domain::error::ClifpError;
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::task::{StopToken, Task, TExec};

#[cfg(windows)]
use crate::domain::config::BiderConfig;

/// Helper the secure player hands execution to on Windows.
#[cfg(windows)]
const TITLE_HELPER_PROCESS: &str = "FlashpointSecurePlayer.exe";

pub struct TTitleExec {
    dirate: Directorate,
    exec: TExec,
    #[cfg(windows)]
    bider_cfg: BiderConfig,
}

impl TTitleExec {
    pub const NAME: &'static str = "TTitleExec";

    #[cfg(windows)]
    pub fn new(dirate: Directorate, exec: TExec, bider_cfg: crate::domain::config::BiderConfig) -> Self {
        Self {
            dirate,
            exec,
            bider_cfg,
        }
    }

    #[cfg(not(windows))]
    pub fn new(
        dirate: Directorate,
        exec: TExec,
        bider_cfg: crate::domain::config::BiderConfig,
    ) -> Self {
        let _ = bider_cfg;
        Self { dirate, exec }
    }

    #[cfg(windows)]
    async fn bide_on_helper(&self) -> Result<(), ClifpError> {
        use crate::infrastructure::process::ProcessBider;
        use std::time::Duration;

        self.dirate
            .log_event("Checking if main title process needs a bide...");

        let bider = ProcessBider::new(
            TITLE_HELPER_PROCESS,
            Duration::from_millis(self.bider_cfg.respawn_grace_ms),
            Duration::from_millis(self.bider_cfg.poll_rate_ms),
        );
        self.dirate.log_event("Beginning bide on main title process...");
        bider
            .bide()
            .await
            .map_err(|e| crate::domain::error::BideError::BideFail(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Task for TTitleExec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.exec.stage()
    }

    fn members(&self) -> Vec<String> {
        self.exec.members()
    }

    fn stop_token(&self) -> Option<StopToken> {
        self.exec.stop_token()
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        self.dirate.log_event("Starting main title process.");
        self.exec.perform().await?;

        #[cfg(windows)]
        self.bide_on_helper().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::BiderConfig;
    use crate::domain::directive::Verbosity;
    use crate::domain::task::ProcessType;
    use crate::services::director::Director;
    use crate::services::process::DeferredProcessManager;
    use crate::services::task::ExecParams;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_title_exec_delegates_to_inner_exec() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("title.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (director, _rx) = Director::new(Verbosity::Silent);
        let dirate = Directorate::new(TTitleExec::NAME, director);
        let deferred = Arc::new(DeferredProcessManager::new(dirate.clone()));
        let exec = TExec::new(
            dirate.clone(),
            crate::domain::task::Stage::Primary,
            "title.sh",
            dir.path().to_path_buf(),
            ExecParams::List(vec![]),
            HashMap::new(),
            ProcessType::Blocking,
            "title",
            deferred,
        );

        let mut task = TTitleExec::new(dirate, exec, BiderConfig::default());
        assert_eq!(task.stage(), crate::domain::task::Stage::Primary);
        task.perform().await.unwrap();
    }
}
