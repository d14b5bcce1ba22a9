//! Restart reconciliation
//!
//! A record still `Processing` that this process does not hold a claim on
//! was interrupted mid-flight. It is never resubmitted. With a recorded hash the ledger is asked for the final
//! outcome; without one the record is failed and the user is told to check
//! the account history before retrying.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use super::ClaimRegistry;
use crate::{
    errors::{EngineError, EngineResult},
    network::{retry_with_backoff, LedgerGateway, RetryConfig},
    storage::TransactionStore,
    types::{ExecutionReceipt, FinalityStatus, TransactionStatus},
};

pub const INTERRUPTED_NOTE: &str =
    "Interrupted before the ledger outcome was recorded; check the account history before retrying";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileSummary {
    pub completed: Vec<Uuid>,
    pub failed: Vec<Uuid>,
    /// Still `Processing`: pending on the ledger or the lookup failed.
    pub unresolved: Vec<Uuid>,
    /// Being executed by this process; left alone.
    pub in_flight: Vec<Uuid>,
}

pub struct Reconciler {
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn LedgerGateway>,
    claims: Arc<ClaimRegistry>,
    retry: RetryConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn LedgerGateway>,
        claims: Arc<ClaimRegistry>,
    ) -> Self {
        Self {
            store,
            gateway,
            claims,
            retry: RetryConfig::default(),
        }
    }

    pub async fn reconcile_interrupted(&self) -> EngineResult<ReconcileSummary> {
        let interrupted = self.store.query_by_status(TransactionStatus::Processing)?;
        let mut summary = ReconcileSummary::default();
        if interrupted.is_empty() {
            return Ok(summary);
        }
        info!(count = interrupted.len(), "Reconciling interrupted transactions");

        for tx in interrupted {
            if self.claims.is_held(tx.id) {
                debug!(transaction_id = %tx.id, "Skipping transaction claimed by this process");
                summary.in_flight.push(tx.id);
                continue;
            }
            // Guards are released only after the outcome is recorded, so a record
            // still Processing here has no live executor.
            let tx = match self.store.get(tx.id) {
                Ok(current) => current,
                Err(EngineError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if tx.status != TransactionStatus::Processing {
                debug!(transaction_id = %tx.id, status = %tx.status, "Settled during reconciliation");
                continue;
            }

            let Some(hash) = tx.transaction_hash else {
                self.store
                    .update_execution(tx.id, ExecutionReceipt::failed(INTERRUPTED_NOTE))?;
                summary.failed.push(tx.id);
                continue;
            };

            let gateway = self.gateway.as_ref();
            let lookup = retry_with_backoff(|| gateway.lookup(&hash), &self.retry, "reconcile lookup").await;

            match lookup {
                Ok(FinalityStatus::Final(outcome)) if outcome.success => {
                    let receipt = ExecutionReceipt::completed(
                        None,
                        None,
                        outcome.gas_unit_price,
                        outcome.gas_fee(),
                    );
                    self.store.update_execution(tx.id, receipt)?;
                    summary.completed.push(tx.id);
                }
                Ok(FinalityStatus::Final(outcome)) => {
                    let note = format!("Ledger rejected the transaction: {}", outcome.vm_status);
                    self.store.update_execution(tx.id, ExecutionReceipt::failed(note))?;
                    summary.failed.push(tx.id);
                }
                Ok(FinalityStatus::Unknown) => {
                    let note = format!("Transaction {} is unknown to the ledger", hash);
                    self.store.update_execution(tx.id, ExecutionReceipt::failed(note))?;
                    summary.failed.push(tx.id);
                }
                Ok(FinalityStatus::Pending) => summary.unresolved.push(tx.id),
                Err(e) => {
                    warn!(transaction_id = %tx.id, %hash, error = %e, "Reconcile lookup failed");
                    summary.unresolved.push(tx.id);
                }
            }
        }

        info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            unresolved = summary.unresolved.len(),
            in_flight = summary.in_flight.len(),
            "Reconciliation finished"
        );
        Ok(summary)
    }
}
