//! Validation of user input before anything reaches the executor

pub mod transfer;
pub mod trade;

pub use transfer::*;
pub use trade::*;
