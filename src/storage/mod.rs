//! Data persistence: transaction records and the trade bundle log

pub mod journal;
pub mod transactions;
pub mod bundles;

pub use transactions::*;
pub use bundles::*;
