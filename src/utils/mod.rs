//! Utility functions and helpers

pub mod math;
pub mod logging;
pub mod clock;

pub use math::*;
pub use logging::*;
pub use clock::*;
