//! Lifecycle enums shared by the task pipeline.

use serde::{Deserialize, Serialize};

/// A task's position in the run lifecycle.
///
/// Stages never interleave: all Startup tasks complete before any Primary task
/// begins, and Shutdown tasks execute last and unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Startup,
    Primary,
    Auxiliary,
    Shutdown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Primary => "primary",
            Self::Auxiliary => "auxiliary",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a spawned child relates to its task's completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    /// The task does not complete until the child exits.
    Blocking,
    /// The child is handed to the deferred manager; the task completes at once.
    Deferred,
    /// Fire-and-forget.
    Detached,
}

impl ProcessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Deferred => "deferred",
            Self::Detached => "detached",
        }
    }
}

impl std::fmt::Display for ProcessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of biding on a named external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BideOutcome {
    /// The process appeared and was waited to termination.
    Ran,
    /// The grace window expired without a sighting.
    NeverRan,
}
