//! Task that surfaces a message to the user.

use async_trait::async_trait;

use crate::domain::directive::{AsyncDirective, SyncDirective};
use crate::domain::error::ClifpError;
use crate::domain::task::Stage;
use crate::services::director::Directorate;
use crate::services::task::Task;

pub struct TMessage {
    dirate: Directorate,
    stage: Stage,
    text: String,
    selectable: bool,
    /// Blocking messages must be rendered before the pipeline continues.
    blocking: bool,
}

impl TMessage {
    pub const NAME: &'static str = "TMessage";

    pub fn new(dirate: Directorate, stage: Stage, text: impl Into<String>) -> Self {
        Self {
            dirate,
            stage,
            text: text.into(),
            selectable: false,
            blocking: false,
        }
    }

    pub fn selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }
}

#[async_trait]
impl Task for TMessage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn members(&self) -> Vec<String> {
        vec![
            format!(".text = \"{}\"", self.text),
            format!(".blocking = {}", self.blocking),
        ]
    }

    async fn perform(&mut self) -> Result<(), ClifpError> {
        if self.blocking {
            self.dirate
                .post_sync(SyncDirective::BlockingMessage {
                    text: self.text.clone(),
                    selectable: self.selectable,
                })
                .await;
        } else {
            self.dirate.post_async(AsyncDirective::Message {
                text: self.text.clone(),
                selectable: self.selectable,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directive::Verbosity;
    use crate::services::director::{Directive, Director};

    #[tokio::test]
    async fn test_posts_async_message() {
        let (director, mut rx) = Director::new(Verbosity::Full);
        let mut task = TMessage::new(
            Directorate::new(TMessage::NAME, director),
            Stage::Primary,
            "hello there",
        );

        task.perform().await.unwrap();

        match rx.recv().await.unwrap() {
            Directive::Async {
                payload: AsyncDirective::Message { text, .. },
                ..
            } => assert_eq!(text, "hello there"),
            other => panic!("unexpected directive {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blocking_message_waits_for_ack() {
        let (director, mut rx) = Director::new(Verbosity::Full);
        let mut task = TMessage::new(
            Directorate::new(TMessage::NAME, director),
            Stage::Primary,
            "read me first",
        )
        .blocking(true);

        let acker = tokio::spawn(async move {
            match rx.recv().await.unwrap() {
                Directive::Sync { ack, .. } => ack.send(()).unwrap(),
                other => panic!("unexpected directive {other:?}"),
            }
        });

        task.perform().await.unwrap();
        acker.await.unwrap();
    }
}
