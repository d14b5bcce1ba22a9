//! Transaction execution: simple transfers, the trade pipeline and restart
//! reconciliation

pub mod claims;
pub mod transfer;
pub mod trade;
pub mod reconcile;

pub use claims::*;
pub use transfer::*;
pub use trade::*;
pub use reconcile::*;
