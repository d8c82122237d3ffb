//! Domain layer: value types shared across the whole pipeline.
//!
//! Everything here is plain data: directive payloads, error values, archive
//! records, settings models, and the lifecycle enums tasks are tagged with.

pub mod config;
pub mod directive;
pub mod error;
pub mod game;
pub mod settings;
pub mod task;

pub use directive::{AsyncDirective, Choice, DirectiveResponse, RequestDirective, SyncDirective, Verbosity};
pub use error::{ClifpError, ErrorDetails, Severity};
pub use task::{ProcessType, Stage};
