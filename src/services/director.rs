//! Directive dispatch, verbosity gating, and logging.
//!
//! One director exists per run. Every user-visible message funnels through it:
//! async directives are fire-and-forget, sync directives are awaited until the
//! frontend acknowledges rendering, and request directives suspend the caller
//! until a typed reply arrives. Errors are logged whatever the verbosity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::domain::directive::{
    AsyncDirective, DirectiveResponse, RequestDirective, SyncDirective, Verbosity,
};
use crate::domain::error::{ClifpError, ErrorDetails, Severity};

/// Wire form of one message on the backend-to-frontend bus.
///
/// Sync and request payloads carry their reply channel; the frontend must
/// complete it. A dropped channel resolves to the request's default response
/// so the worker never hangs.
#[derive(Debug)]
pub enum Directive {
    Async {
        source: String,
        payload: AsyncDirective,
    },
    Sync {
        source: String,
        payload: SyncDirective,
        ack: oneshot::Sender<()>,
    },
    Request {
        source: String,
        payload: RequestDirective,
        reply: oneshot::Sender<DirectiveResponse>,
    },
}

pub type DirectiveReceiver = mpsc::UnboundedReceiver<Directive>;

/// Singleton dispatcher and verbosity gate.
pub struct Director {
    verbosity: RwLock<Verbosity>,
    tx: mpsc::UnboundedSender<Directive>,
    critical_error: AtomicBool,
}

impl Director {
    /// Build a director and the receiving end a frontend consumes.
    pub fn new(verbosity: Verbosity) -> (Arc<Self>, DirectiveReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let director = Arc::new(Self {
            verbosity: RwLock::new(verbosity),
            tx,
            critical_error: AtomicBool::new(false),
        });
        info!(level = %verbosity, "notification level set");
        (director, rx)
    }

    pub fn verbosity(&self) -> Verbosity {
        *self.verbosity.read().expect("verbosity lock poisoned")
    }

    pub fn set_verbosity(&self, verbosity: Verbosity) {
        *self.verbosity.write().expect("verbosity lock poisoned") = verbosity;
        info!(level = %verbosity, "notification level set");
    }

    pub fn critical_error_occurred(&self) -> bool {
        self.critical_error.load(Ordering::SeqCst)
    }

    /// Record a plain event line, tagged with its source component.
    pub fn log_event(&self, source: &str, event: &str) {
        info!(source, "{event}");
    }

    /// Record an error, tagged with its source component.
    pub fn log_error(&self, source: &str, details: &ErrorDetails) {
        match details.severity {
            Severity::Critical => {
                self.critical_error.store(true, Ordering::SeqCst);
                error!(source, code = details.code, "{details}");
            }
            Severity::Error => error!(source, code = details.code, "{details}"),
            Severity::Warning => warn!(source, code = details.code, "{details}"),
        }
    }

    fn error_passes_gate(&self, severity: Severity) -> bool {
        match self.verbosity() {
            Verbosity::Full => true,
            Verbosity::Quiet => severity == Severity::Critical,
            Verbosity::Silent => false,
        }
    }

    fn passes_gate(&self) -> bool {
        self.verbosity() == Verbosity::Full
    }

    /// Emit an async directive and continue.
    pub fn post_async(&self, source: &str, payload: AsyncDirective) {
        if let AsyncDirective::Error(details) = &payload {
            self.log_error(source, details);
            if !self.error_passes_gate(details.severity) {
                return;
            }
        } else if !self.passes_gate() {
            return;
        }

        let _ = self.tx.send(Directive::Async {
            source: source.to_string(),
            payload,
        });
    }

    /// Emit a sync directive and wait until the frontend has rendered it.
    pub async fn post_sync(&self, source: &str, payload: SyncDirective) {
        if !self.passes_gate() {
            return;
        }

        let (ack, done) = oneshot::channel();
        if self
            .tx
            .send(Directive::Sync {
                source: source.to_string(),
                payload,
                ack,
            })
            .is_err()
        {
            return;
        }
        // A vanished frontend counts as rendered.
        let _ = done.await;
    }

    /// Emit a request directive and suspend until the typed reply arrives.
    ///
    /// A gated or unanswerable request resolves to its default response.
    pub async fn post_request(&self, source: &str, payload: RequestDirective) -> DirectiveResponse {
        let default = payload.default_response();

        if let RequestDirective::BlockingError { error, .. } = &payload {
            self.log_error(source, error);
            if !self.error_passes_gate(error.severity) {
                return default;
            }
        } else if !self.passes_gate() {
            return default;
        }

        let (reply, response) = oneshot::channel();
        if self
            .tx
            .send(Directive::Request {
                source: source.to_string(),
                payload,
                reply,
            })
            .is_err()
        {
            return default;
        }

        response.await.unwrap_or(default)
    }
}

/// Handle letting a component post directives tagged with its name.
///
/// Embedded by value wherever the original design would have inherited a
/// "can post directives" capability.
#[derive(Clone)]
pub struct Directorate {
    name: &'static str,
    director: Arc<Director>,
}

impl Directorate {
    pub fn new(name: &'static str, director: Arc<Director>) -> Self {
        Self { name, director }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn director(&self) -> &Arc<Director> {
        &self.director
    }

    pub fn log_event(&self, event: &str) {
        self.director.log_event(self.name, event);
    }

    pub fn post_async(&self, payload: AsyncDirective) {
        self.director.post_async(self.name, payload);
    }

    pub async fn post_sync(&self, payload: SyncDirective) {
        self.director.post_sync(self.name, payload).await;
    }

    pub async fn post_request(&self, payload: RequestDirective) -> DirectiveResponse {
        self.director.post_request(self.name, payload).await
    }

    /// Report an error as an async directive.
    pub fn post_error(&self, err: &ClifpError) {
        self.post_async(AsyncDirective::Error(err.details()));
    }
}
