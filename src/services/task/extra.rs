//! Task that opens a title's extras folder with the system handler.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;

use crate::domain::error::{ClifpError, ExtraError};
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::task::Task;

#[cfg(target_os = "macos")]
const OPENER: &str = "open";
#[cfg(windows)]
const OPENER: &str = "explorer";
#[cfg(not(any(target_os = "macos", windows)))]
const OPENER: &str = "xdg-open";

pub struct TExtra {
    dirate: Directorate,
    stage: Stage,
    directory: PathBuf,
}

impl TExtra {
    pub const NAME: &'static str = "TExtra";

    pub fn new(dirate: Directorate, stage: Stage, directory: PathBuf) -> Self {
        Self {
            dirate,
            stage,
            directory,
        }
    }
}

#[async_trait]
impl Task for TExtra {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![format!(".directory = \"{}\"", self.directory.display())]
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        if !self.directory.is_dir() {
            return Err(ExtraError::NotFound(self.directory.display().to_string()).into());
        }

        self.dirate
            .log_event(&format!("Opening extra {}", self.directory.display()));

        tokio::process::Command::new(OPENER)
            .arg(&self.directory)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ExtraError::NotFound(format!("{}: {e}", self.directory.display())))?;

        Ok(())
    }
}
