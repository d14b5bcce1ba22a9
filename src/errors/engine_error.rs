//! Engine-level error taxonomy

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;
use super::LedgerError;
use crate::types::TransactionStatus;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Ledger operation failed: {source}")]
    Ledger {
        id: Option<Uuid>,
        #[source]
        source: LedgerError,
    },

    #[error("Transaction not found: {0}")]
    NotFound(Uuid),

    #[error("Key vault error: {0}")]
    Vault(String),
}

impl From<LedgerError> for EngineError {
    fn from(source: LedgerError) -> Self {
        EngineError::Ledger { id: None, source }
    }
}

impl EngineError {
    pub fn ledger(&self) -> Option<&LedgerError> {
        match self {
            EngineError::Ledger { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt journal {path} at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Failed to encode record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Record already exists: {0}")]
    Duplicate(Uuid),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Illegal transition {from} -> {to}")]
    Illegal {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Too late to cancel: transaction is already {status}")]
    TooLate { status: TransactionStatus },

    #[error("{field} is already recorded")]
    AlreadyRecorded { field: &'static str },

    #[error("A transaction hash can only be recorded while Processing or Completed, not {status}")]
    HashNotAllowed { status: TransactionStatus },

    #[error("{status} transaction {reason}")]
    ScheduleMismatch {
        status: TransactionStatus,
        reason: &'static str,
    },

    #[error("Transaction {0} is in flight and cannot be deleted")]
    InFlight(Uuid),

    #[error("Scheduled transaction is not due until {scheduled_at}")]
    NotYetDue { scheduled_at: DateTime<Utc> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed address {value:?}: {reason}")]
    MalformedAddress { value: String, reason: String },

    #[error("Malformed transaction hash {value:?}: {reason}")]
    MalformedHash { value: String, reason: String },

    #[error("Malformed amount {value:?}: {reason}")]
    MalformedAmount { value: String, reason: String },

    #[error("Unsupported asset {0}")]
    UnsupportedAsset(String),

    #[error("Sender and recipient are the same account")]
    SameSenderAndRecipient,

    #[error("Scheduled time {scheduled_at} is not in the future")]
    ScheduleInPast { scheduled_at: String },

    #[error("Invalid initial record: {0}")]
    InvalidInitialState(String),

    #[error("Invalid trade request: {0}")]
    InvalidTrade(String),

    #[error("Trade module is not configured")]
    TradeModuleNotConfigured,
}
