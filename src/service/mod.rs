//! Persistence boundary exposed to UI collaborators

pub mod transfer_service;

pub use transfer_service::*;
