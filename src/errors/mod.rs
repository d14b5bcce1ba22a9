//! Error types for the engine

pub mod engine_error;
pub mod ledger_error;

pub use engine_error::*;
pub use ledger_error::*;
