//! Contract over the remote ledger

use async_trait::async_trait;
use crate::{
    errors::LedgerError,
    session::Identity,
    types::{AccountAddress, EntryFunctionCall, FinalityStatus, SubmissionOutcome, TxHash},
};

/// One logical remote operation per call. Implementations never retry a
/// submission and never touch local state; retry policy belongs to callers.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Signs and submits `call`, then waits (bounded) for finality.
    async fn submit(
        &self,
        identity: &Identity,
        call: &EntryFunctionCall,
    ) -> Result<SubmissionOutcome, LedgerError>;

    /// Native-asset balance in base units.
    async fn balance(&self, address: &AccountAddress) -> Result<u64, LedgerError>;

    /// Independent finality check for a previously accepted hash.
    async fn lookup(&self, hash: &TxHash) -> Result<FinalityStatus, LedgerError>;
}
