//! Task wrapper around a process bide.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::error::{BideError, ClifpError};
use crate::domain::task::{BideOutcome, Stage};
use crate::services::director::Directorate;
use crate::services::task::{StopToken, Task};
use crate::infrastructure::process::ProcessBider;

pub struct TBideProcess {
    dirate: Directorate,
    stage: Stage,
    stop: StopToken,
    process_name: String,
    bider: ProcessBider,
}

impl TBideProcess {
    pub const NAME: &'static str = "TBideProcess";

    pub fn new(
        dirate: Directorate,
        stage: Stage,
        process_name: impl Into<String>,
        respawn_grace: Duration,
        poll_rate: Duration,
    ) -> Self {
        let process_name = process_name.into();
        Self {
            dirate,
            stage,
            stop: StopToken::new(),
            bider: ProcessBider::new(process_name.clone(), respawn_grace, poll_rate),
            process_name,
        }
    }
}

#[async_trait]
impl Task for TBideProcess {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![format!(".process_name = \"{}\"", self.process_name)]
    }

    fn stop_token(&self) -> Option<StopToken> {
        Some(self.stop.clone())
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        self.dirate.log_event(&format!(
            "Waiting for process {} to be running",
            self.process_name
        ));

        let outcome = tokio::select! {
            outcome = self.bider.bide() => outcome,
            () = self.stop.triggered() => {
                self.dirate.log_event("Stopping current bide process...");
                if let Err(close_err) = self.bider.close_watched_process() {
                    self.dirate.post_error(
                        &ClifpError::from(BideError::BideFail(format!(
                            "Could not automatically end the running title! It will have to be \
                             closed manually. ({close_err})"
                        ))),
                    );
                }
                return Err(ClifpError::Cancelled);
            }
        };

        match outcome {
            Ok(BideOutcome::Ran) => {
                self.dirate.log_event(&format!(
                    "Wait-on process {} has finished",
                    self.process_name
                ));
                Ok(())
            }
            Ok(BideOutcome::NeverRan) => {
                self.dirate.log_event(&format!(
                    "Wait-on process {} was not running after the grace period",
                    self.process_name
                ));
                Ok(())
            }
            Err(e) => Err(BideError::BideFail(e.to_string()).into()),
        }
    }
}
