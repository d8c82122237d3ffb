//! Fixed-duration wait between pipeline steps.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::error::ClifpError;
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::task::{StopToken, Task};

pub struct TSleep {
    dirate: Directorate,
    stage: Stage,
    duration: Duration,
    stop: StopToken,
}

impl TSleep {
    pub const NAME: &'static str = "TSleep";

    pub fn new(dirate: Directorate, stage: Stage, duration: Duration) -> Self {
        Self {
            dirate,
            stage,
            duration,
            stop: StopToken::new(),
        }
    }
}

#[async_trait]
impl Task for TSleep {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![format!(".duration = {}ms", self.duration.as_millis())]
    }

    fn stop_token(&self) -> Option<StopToken> {
        Some(self.stop.clone())
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        self.dirate.log_event(&format!(
            "Sleeping for {} milliseconds",
            self.duration.as_millis()
        ));

        tokio::select! {
            () = tokio::time::sleep(self.duration) => {
                self.dirate.log_event("Finished sleeping");
            }
            () = self.stop.triggered() => {
                self.dirate.log_event("Sleep interrupted");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::Director;
    use std::time::Instant;

    fn sleeper(duration: Duration) -> TSleep {
        let (director, _rx) = Director::new(Verbosity::Full);
        TSleep::new(Directorate::new(TSleep::NAME, director), Stage::Startup, duration)
    }

    #[tokio::test]
    async fn test_sleeps_for_duration() {
        let mut task = sleeper(Duration::from_millis(50));
        let start = Instant::now();
        task.perform().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_stop_interrupts_sleep() {
        let mut task = sleeper(Duration::from_secs(60));
        let token = task.stop_token().unwrap();

        let start = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.request();
        });
        task.perform().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
