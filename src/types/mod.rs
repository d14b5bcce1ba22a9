//! Core data types and structures

pub mod addresses;
pub mod transaction;
pub mod ledger;
pub mod bundle;

pub use addresses::*;
pub use transaction::*;
pub use ledger::*;
pub use bundle::*;
