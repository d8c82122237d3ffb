//! CLIFp - CLI companion for the Flashpoint web-game preservation archive
//!
//! Orchestrates everything the archive's graphical launcher normally does for a
//! title: starting background services, obtaining and mounting its data pack,
//! launching the title process, waiting on its lifecycle, and tearing services
//! back down. All user interaction flows through a typed directive bus so the
//! same backend serves terminal and windowed frontends and stays headless
//! testable.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use services::core::Core;
pub use services::director::Director;
pub use services::driver::Driver;
