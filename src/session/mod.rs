//! Signing identity and the active account session

pub mod vault;
pub mod account;

pub use vault::*;
pub use account::*;
