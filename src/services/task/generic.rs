//! Arbitrary one-shot work wrapped as a task.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::domain::error::ClifpError;
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::task::Task;

pub struct TGeneric {
    dirate: Directorate,
    stage: Stage,
    description: String,
    action: Option<BoxFuture<'static, Result<(), ClifpError>>>,
}

impl TGeneric {
    pub const NAME: &'static str = "TGeneric";

    pub fn new(
        dirate: Directorate,
        stage: Stage,
        description: impl Into<String>,
        action: BoxFuture<'static, Result<(), ClifpError>>,
    ) -> Self {
        Self {
            dirate,
            stage,
            description: description.into(),
            action: Some(action),
        }
    }
}

#[async_trait]
impl Task for TGeneric {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![format!(".description = \"{}\"", self.description)]
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        self.dirate.log_event(&self.description);
        match self.action.take() {
            Some(action) => action.await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::Director;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_wrapped_action_once() {
        let (director, _rx) = Director::new(Verbosity::Full);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        let mut task = TGeneric::new(
            Directorate::new(TGeneric::NAME, director),
            Stage::Shutdown,
            "flip a flag",
            Box::pin(async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        );

        task.perform().await.unwrap();
        assert!(ran.load(Ordering::SeqCst));

        // Second perform is a no-op rather than a panic.
        task.perform().await.unwrap();
    }
}
