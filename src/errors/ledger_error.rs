//! Failures reported by the remote ledger boundary

use std::time::Duration;
use thiserror::Error;
use crate::types::{AccountAddress, TxHash};

#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("No active signing identity")]
    NoActiveIdentity,

    #[error("Active identity {active} cannot sign for sender {sender}")]
    SignerMismatch {
        sender: AccountAddress,
        active: AccountAddress,
    },

    #[error("Ledger rejected the transaction: {reason}")]
    RemoteRejected {
        reason: String,
        hash: Option<TxHash>,
    },

    #[error("Finality not observed within {}s", .waited.as_secs())]
    Timeout {
        waited: Duration,
        hash: Option<TxHash>,
    },

    #[error("Malformed ledger response: {detail}")]
    MalformedResponse {
        detail: String,
        hash: Option<TxHash>,
    },

    #[error("Ledger request failed: {message}")]
    Transport { message: String },
}

impl LedgerError {
    pub fn hash(&self) -> Option<&TxHash> {
        match self {
            LedgerError::RemoteRejected { hash, .. }
            | LedgerError::Timeout { hash, .. }
            | LedgerError::MalformedResponse { hash, .. } => hash.as_ref(),
            _ => None,
        }
    }

    /// True when the remote operation may have happened despite the error.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            LedgerError::Timeout { .. } | LedgerError::MalformedResponse { .. }
        )
    }

    /// True for failures of idempotent reads that are worth another attempt.
    /// Only transport failures qualify; reads never time out on finality.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Transport { .. })
    }

    /// Human-readable reason stored on a failed transaction.
    pub fn failure_note(&self) -> String {
        match self {
            LedgerError::Timeout { hash: Some(hash), .. } => format!(
                "{self}; the transfer may still have executed on-chain (hash {hash})"
            ),
            LedgerError::Timeout { hash: None, .. } => {
                format!("{self}; the transfer may still have executed on-chain")
            }
            LedgerError::MalformedResponse { hash: Some(hash), .. } => format!(
                "{self}; outcome of {hash} could not be confirmed"
            ),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::Transport {
            message: err.to_string(),
        }
    }
}
