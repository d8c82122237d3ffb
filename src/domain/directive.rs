//! Typed messages on the backend-to-frontend bus.
//!
//! Three families with distinct delivery semantics:
//! - async: fire-and-forget, the backend continues immediately
//! - sync: no reply value, but the backend waits until fully rendered
//! - request: the backend blocks cooperatively for a typed response
//!
//! Every directive is self-contained; a frontend never queries back into the
//! pipeline to render one.

use serde::{Deserialize, Serialize};

use super::error::ErrorDetails;

/// How much of the directive stream reaches the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Everything passes.
    Full,
    /// Only critical errors pass.
    Quiet,
    /// Nothing passes. Errors are still logged.
    Silent,
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::Full
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Quiet => write!(f, "quiet"),
            Self::Silent => write!(f, "silent"),
        }
    }
}

/// Fire-and-forget notifications and progress updates.
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncDirective {
    Message {
        text: String,
        selectable: bool,
    },
    Error(ErrorDetails),
    /// A long-running procedure (download, mount) began.
    ProcedureStart {
        label: String,
    },
    ProcedureStop,
    ProcedureProgress {
        current: u64,
    },
    ProcedureScale {
        max: u64,
    },
    ClipboardUpdate {
        text: String,
    },
    StatusUpdate {
        heading: String,
        message: String,
    },
}

/// Messages that must be fully rendered before the backend continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDirective {
    BlockingMessage { text: String, selectable: bool },
}

/// Button choices offered by a blocking error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Choice {
    Ok,
    Yes,
    No,
}

impl std::fmt::Display for Choice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "Ok"),
            Self::Yes => write!(f, "Yes"),
            Self::No => write!(f, "No"),
        }
    }
}

/// Directives the backend blocks on until the frontend supplies a value.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestDirective {
    BlockingError {
        error: ErrorDetails,
        choices: Vec<Choice>,
        default: Choice,
    },
    SaveFilename {
        caption: String,
        dir: String,
        filter: String,
    },
    ExistingDir {
        caption: String,
        starting_dir: String,
    },
    ItemSelection {
        caption: String,
        label: String,
        items: Vec<String>,
    },
    YesOrNo {
        question: String,
    },
}

/// A frontend's typed answer to a request directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveResponse {
    Choice(Choice),
    Text(String),
    YesNo(bool),
}

impl RequestDirective {
    /// The value substituted when the frontend cancels or disappears.
    pub fn default_response(&self) -> DirectiveResponse {
        match self {
            Self::BlockingError { default, .. } => DirectiveResponse::Choice(*default),
            Self::SaveFilename { .. } | Self::ExistingDir { .. } | Self::ItemSelection { .. } => {
                DirectiveResponse::Text(String::new())
            }
            Self::YesOrNo { .. } => DirectiveResponse::YesNo(false),
        }
    }
}

impl DirectiveResponse {
    pub fn as_choice(&self) -> Option<Choice> {
        match self {
            Self::Choice(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_yes_no(&self) -> Option<bool> {
        match self {
            Self::YesNo(b) => Some(*b),
            _ => None,
        }
    }
}
