//! Transfer executor

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use super::{ClaimGuard, ClaimRegistry};
use crate::{
    errors::{EngineError, EngineResult, LedgerError, TransitionError},
    network::{retry_with_backoff, LedgerGateway, RetryConfig},
    session::AccountSession,
    storage::TransactionStore,
    types::{
        EntryFunctionCall, ExecutionReceipt, FinalityStatus, SubmissionOutcome, Transaction,
        TransactionStatus, TxHash,
    },
    utils::{to_base_units, Clock},
};

pub struct TransferExecutor {
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn LedgerGateway>,
    session: Arc<AccountSession>,
    clock: Arc<dyn Clock>,
    transfer_function: String,
    decimals: u32,
    lookup_retry: RetryConfig,
    claims: Arc<ClaimRegistry>,
}

impl TransferExecutor {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn LedgerGateway>,
        session: Arc<AccountSession>,
        clock: Arc<dyn Clock>,
        transfer_function: impl Into<String>,
        decimals: u32,
    ) -> Self {
        Self {
            store,
            gateway,
            session,
            clock,
            transfer_function: transfer_function.into(),
            decimals,
            lookup_retry: RetryConfig::default(),
            claims: ClaimRegistry::new(),
        }
    }

    /// Records this executor is working on right now.
    pub fn claims(&self) -> &Arc<ClaimRegistry> {
        &self.claims
    }

    /// Claims a `Pending` record, or a `Scheduled` one that is due at `now`,
    /// by persisting `-> Processing`. The guard marks the record as live
    /// until it is dropped.
    pub fn claim_at(&self, id: Uuid, now: DateTime<Utc>) -> EngineResult<(Transaction, ClaimGuard)> {
        let guard = self.claims.hold(id);
        let current = self.store.get(id)?;
        if current.status == TransactionStatus::Scheduled && !current.is_due(now) {
            if let Some(scheduled_at) = current.scheduled_at {
                return Err(TransitionError::NotYetDue { scheduled_at }.into());
            }
        }
        let claimed = self.store.update_status(id, TransactionStatus::Processing)?;
        Ok((claimed, guard))
    }

    /// Claims the record and executes it.
    ///
    /// The claim is persisted before any remote call, so a record can never be
    /// submitted twice. A scheduled record is refused until it is due. Ledger
    /// failures are persisted on the record and then returned as
    /// [`EngineError::Ledger`].
    pub async fn execute(&self, id: Uuid) -> EngineResult<Transaction> {
        let (claimed, _claim) = self.claim_at(id, self.clock.now())?;
        self.run_claimed(claimed).await
    }

    /// Executes a record already claimed as `Processing`.
    pub async fn run_claimed(&self, tx: Transaction) -> EngineResult<Transaction> {
        if tx.status != TransactionStatus::Processing {
            return Err(TransitionError::Illegal {
                from: tx.status,
                to: TransactionStatus::Processing,
            }
            .into());
        }

        let identity = match self.session.require_identity().await {
            Ok(identity) if identity.address() == &tx.from_address => identity,
            Ok(identity) => {
                let mismatch = LedgerError::SignerMismatch {
                    sender: tx.from_address,
                    active: *identity.address(),
                };
                return self.fail(&tx, mismatch);
            }
            Err(e) => return self.fail(&tx, e),
        };

        let call = match self.transfer_call(&tx) {
            Ok(call) => call,
            Err(e) => {
                self.mark_failed(&tx, None, e.to_string())?;
                return Err(e);
            }
        };
        info!(
            transaction_id = %tx.id,
            to = %tx.to_address,
            amount = %tx.amount,
            asset = %tx.asset_type,
            "🚀 Executing transfer"
        );

        match self.gateway.submit(&identity, &call).await {
            Ok(outcome) => self.complete(&tx, outcome).await,
            Err(LedgerError::MalformedResponse {
                detail,
                hash: Some(hash),
            }) => self.confirm_independently(&tx, hash, detail).await,
            Err(e) => self.fail(&tx, e),
        }
    }

    fn transfer_call(&self, tx: &Transaction) -> EngineResult<EntryFunctionCall> {
        let units = to_base_units(tx.amount, self.decimals)?;
        Ok(EntryFunctionCall::new(
            self.transfer_function.clone(),
            Vec::new(),
            vec![json!(tx.to_address.to_string()), json!(units.to_string())],
        ))
    }

    async fn complete(&self, tx: &Transaction, outcome: SubmissionOutcome) -> EngineResult<Transaction> {
        let outcome = match outcome.confirmed() {
            Ok(outcome) => outcome,
            Err(LedgerError::MalformedResponse {
                detail,
                hash: Some(hash),
            }) => return self.confirm_independently(tx, hash, detail).await,
            Err(e) => return self.fail(tx, e),
        };

        let accepted_at = outcome.accepted_at.unwrap_or_else(|| self.clock.now());
        let receipt = ExecutionReceipt::completed(
            Some(outcome.hash),
            Some(accepted_at),
            outcome.gas_unit_price,
            outcome.gas_fee(),
        );
        let completed = self.store.update_execution(tx.id, receipt)?;
        info!(
            transaction_id = %tx.id,
            hash = %outcome.hash,
            gas_fee = outcome.gas_fee(),
            "✅ Transfer completed"
        );

        if let Err(e) = self.session.refresh_balance(self.gateway.as_ref()).await {
            warn!(transaction_id = %tx.id, error = %e, "Balance refresh after transfer failed");
        }
        Ok(completed)
    }

    /// The node accepted the payload but its response could not be read.
    /// Completes only if an independent lookup confirms success.
    async fn confirm_independently(
        &self,
        tx: &Transaction,
        hash: TxHash,
        detail: String,
    ) -> EngineResult<Transaction> {
        warn!(transaction_id = %tx.id, %hash, %detail, "Confirming malformed submission by lookup");
        self.record_accepted(tx, hash)?;

        let gateway = self.gateway.as_ref();
        let lookup = retry_with_backoff(|| gateway.lookup(&hash), &self.lookup_retry, "finality lookup").await;

        match lookup {
            Ok(FinalityStatus::Final(outcome)) if outcome.success => {
                let receipt = ExecutionReceipt::completed(
                    None,
                    None,
                    outcome.gas_unit_price,
                    outcome.gas_fee(),
                );
                let completed = self.store.update_execution(tx.id, receipt)?;
                info!(transaction_id = %tx.id, %hash, "✅ Transfer confirmed by lookup");
                if let Err(e) = self.session.refresh_balance(gateway).await {
                    warn!(transaction_id = %tx.id, error = %e, "Balance refresh after transfer failed");
                }
                Ok(completed)
            }
            Ok(FinalityStatus::Final(outcome)) => self.fail(
                tx,
                LedgerError::RemoteRejected {
                    reason: outcome.vm_status,
                    hash: Some(hash),
                },
            ),
            _ => self.fail(tx, LedgerError::MalformedResponse { detail, hash: Some(hash) }),
        }
    }

    fn record_accepted(&self, tx: &Transaction, hash: TxHash) -> EngineResult<Transaction> {
        let receipt = ExecutionReceipt::accepted(hash, self.clock.now());
        self.store.update_execution(tx.id, receipt)
    }

    /// Moves the record to `Failed` with a readable reason, then reports the
    /// ledger error to the caller. A storage failure here wins over the ledger
    /// error: the caller must not believe the failure was recorded.
    fn fail(&self, tx: &Transaction, err: LedgerError) -> EngineResult<Transaction> {
        self.mark_failed(tx, err.hash().copied(), err.failure_note())?;
        error!(transaction_id = %tx.id, error = %err, ambiguous = err.is_ambiguous(), "❌ Transfer failed");

        Err(EngineError::Ledger {
            id: Some(tx.id),
            source: err,
        })
    }

    fn mark_failed(&self, tx: &Transaction, hash: Option<TxHash>, note: String) -> EngineResult<()> {
        if let Some(hash) = hash {
            if self.store.get(tx.id)?.transaction_hash.is_none() {
                self.record_accepted(tx, hash)?;
            }
        }
        self.store.update_execution(tx.id, ExecutionReceipt::failed(note))?;
        Ok(())
    }
}
