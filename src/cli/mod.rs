//! CLI layer: argument surface, subcommand implementations, and the console
//! frontend that renders directives.

pub mod commands;
pub mod frontend;
pub mod types;

pub use types::{Cli, CommandArgs};
