//! Ledger call payloads and submission outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use super::TxHash;
use crate::errors::LedgerError;

/// A Move entry-function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFunctionCall {
    pub function: String,
    pub type_args: Vec<String>,
    pub args: Vec<Value>,
}

impl EntryFunctionCall {
    pub fn new(function: impl Into<String>, type_args: Vec<String>, args: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            type_args,
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub hash: TxHash,
    pub gas_used: u64,
    pub gas_unit_price: u64,
    pub finalized: bool,
    pub success: bool,
    pub vm_status: String,
    /// When the node accepted the payload, if the gateway observed it.
    /// Outcomes read back through `lookup` leave it unset.
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
}

impl SubmissionOutcome {
    pub fn gas_fee(&self) -> u64 {
        self.gas_used.saturating_mul(self.gas_unit_price)
    }

    /// Passes the outcome through only if it is final and successful.
    pub fn confirmed(self) -> Result<Self, LedgerError> {
        if !self.finalized {
            return Err(LedgerError::MalformedResponse {
                detail: "submission returned without finality confirmation".to_string(),
                hash: Some(self.hash),
            });
        }
        if !self.success {
            return Err(LedgerError::RemoteRejected {
                reason: self.vm_status,
                hash: Some(self.hash),
            });
        }
        Ok(self)
    }
}

/// What the ledger currently knows about a previously submitted hash.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalityStatus {
    Unknown,
    Pending,
    Final(SubmissionOutcome),
}
