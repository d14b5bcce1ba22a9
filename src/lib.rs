//! Wallet transaction engine
//!
//! Creates, schedules, executes and records transfers for a self-custodial
//! wallet, runs the five-step trade pipeline and keeps every record's
//! lifecycle consistent across restarts.

pub mod config;
pub mod types;
pub mod errors;
pub mod lifecycle;
pub mod network;
pub mod session;
pub mod storage;
pub mod validation;
pub mod execution;
pub mod scheduler;
pub mod service;
pub mod utils;

// Re-export commonly used items
pub use config::{Config, CONFIG};
pub use errors::{EngineError, EngineResult};
pub use service::TransferService;
pub use types::*;
