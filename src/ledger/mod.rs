//! Ledger module containing record ingestion and the matching/reporting orchestrator

pub mod core;
pub mod import;
pub mod runs;

pub use self::core::*;
pub use import::*;
pub use runs::*;
