//! The task hierarchy the driver executes.
//!
//! A task is one unit of work with a stage tag and a single completion.
//! Cancellable tasks hand out a [`StopToken`] before `perform()` so the driver
//! can request a stop while the perform future is in flight; tasks observe the
//! token only at their suspension points.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::domain::error::ClifpError;
use crate::domain::task::Stage;

pub mod await_docker;
pub mod bide_process;
pub mod download;
pub mod exec;
pub mod extra;
pub mod extract;
pub mod generic;
pub mod message;
pub mod mount;
pub mod sleep;
pub mod title_exec;

pub use await_docker::TAwaitDocker;
pub use bide_process::TBideProcess;
pub use download::TDownload;
pub use exec::{ExecParams, TExec};
pub use extra::TExtra;
pub use extract::TExtract;
pub use generic::TGeneric;
pub use message::TMessage;
pub use mount::TMount;
pub use sleep::TSleep;
pub use title_exec::TTitleExec;

/// Cancellation flag shared between the driver and a running task.
#[derive(Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the holder to stop at its next suspension point.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once a stop has been requested.
    pub async fn triggered(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// One unit of pipeline work.
///
/// Contract: the driver calls `perform()` exactly once; the task is destroyed
/// before the next one begins. Parameters are immutable after enqueue.
#[async_trait]
pub trait Task: Send {
    /// Component name used to tag logs and directives.
    fn name(&self) -> &'static str;

    fn stage(&self) -> Stage;

    /// Log form of the task's parameters.
    fn members(&self) -> Vec<String>;

    /// Token the driver uses to request cancellation, if the task supports it.
    fn stop_token(&self) -> Option<StopToken> {
        None
    }

    async fn perform(&mut self) -> Result<(), ClifpError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_token_triggers_waiters() {
        let token = StopToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.triggered().await;
            true
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.request();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_token_triggered_resolves_if_already_requested() {
        let token = StopToken::new();
        token.request();
        // Must not hang.
        tokio::time::timeout(Duration::from_millis(100), token.triggered())
            .await
            .unwrap();
        assert!(token.is_requested());
    }
}
