//! Read access to the archive's sqlite database.

pub mod queries;

pub use queries::{FlashpointDb, FIND_ENTRY_LIMIT};
