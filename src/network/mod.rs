//! Remote ledger boundary and connection management

pub mod gateway;
pub mod rest;
pub mod retry;

pub use gateway::*;
pub use rest::*;
pub use retry::*;
