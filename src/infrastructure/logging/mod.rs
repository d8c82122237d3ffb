//! Rolling per-day log next to the binary.

pub mod logger;
pub mod rotation;

pub use logger::init_logging;
pub use rotation::prune_old_logs;
