//! Transaction lifecycle state machine
//!
//! Legal transitions:
//!
//! ```text
//! Pending   -> Processing
//! Scheduled -> Processing | Cancelled
//! Processing -> Completed | Failed
//! ```
//!
//! `Completed`, `Failed` and `Cancelled` are absorbing. Every function here
//! validates before it mutates, so a rejected change leaves the record as it
//! was.

use tracing::debug;
use crate::errors::{TransitionError, ValidationError};
use crate::types::{ExecutionReceipt, Transaction, TransactionStatus};

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Scheduled, Processing)
                | (Scheduled, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

/// Checks a status change against the transition table and the scheduling
/// invariant (only scheduled records pass through `Scheduled`).
pub fn check_transition(tx: &Transaction, to: TransactionStatus) -> Result<(), TransitionError> {
    let from = tx.status;
    if !from.can_transition_to(to) {
        return Err(TransitionError::Illegal { from, to });
    }
    match from {
        TransactionStatus::Pending if tx.scheduled_at.is_some() => {
            Err(TransitionError::ScheduleMismatch {
                status: from,
                reason: "carries a schedule time",
            })
        }
        TransactionStatus::Scheduled if tx.scheduled_at.is_none() => {
            Err(TransitionError::ScheduleMismatch {
                status: from,
                reason: "has no schedule time",
            })
        }
        _ => Ok(()),
    }
}

pub fn apply_status(tx: &mut Transaction, to: TransactionStatus) -> Result<(), TransitionError> {
    check_transition(tx, to)?;
    debug!(transaction_id = %tx.id, from = %tx.status, to = %to, "Applying status transition");
    tx.status = to;
    Ok(())
}

/// User cancellation: only legal while `Scheduled`.
pub fn apply_cancel(tx: &mut Transaction) -> Result<(), TransitionError> {
    if tx.status == TransactionStatus::Processing {
        return Err(TransitionError::TooLate { status: tx.status });
    }
    apply_status(tx, TransactionStatus::Cancelled)
}

/// Applies execution bookkeeping. The hash and `executed_at` are write-once;
/// re-recording the same hash is a no-op, a different one is rejected.
pub fn apply_receipt(tx: &mut Transaction, receipt: &ExecutionReceipt) -> Result<(), TransitionError> {
    let target = receipt.status.unwrap_or(tx.status);
    let status_changes = target != tx.status;

    if status_changes {
        check_transition(tx, target)?;
    } else if tx.status.is_terminal() {
        // Bookkeeping on a closed record would rewrite history.
        return Err(TransitionError::Illegal {
            from: tx.status,
            to: target,
        });
    }

    if let Some(hash) = receipt.transaction_hash {
        if !matches!(target, TransactionStatus::Processing | TransactionStatus::Completed) {
            return Err(TransitionError::HashNotAllowed { status: target });
        }
        if tx.transaction_hash.is_some_and(|existing| existing != hash) {
            return Err(TransitionError::AlreadyRecorded {
                field: "transaction_hash",
            });
        }
    }
    if receipt.executed_at.is_some() && tx.executed_at.is_some() {
        return Err(TransitionError::AlreadyRecorded { field: "executed_at" });
    }

    if let Some(hash) = receipt.transaction_hash {
        tx.transaction_hash = Some(hash);
    }
    if let Some(executed_at) = receipt.executed_at {
        tx.executed_at = Some(executed_at);
    }
    if let Some(gas_price) = receipt.gas_price {
        tx.gas_price = Some(gas_price);
    }
    if let Some(gas_fee) = receipt.gas_fee {
        tx.gas_fee = Some(gas_fee);
    }
    if let Some(note) = &receipt.note {
        append_note(tx, note);
    }
    if status_changes {
        debug!(transaction_id = %tx.id, from = %tx.status, to = %target, "Applying status transition");
        tx.status = target;
    }
    Ok(())
}

/// A freshly created record must be untouched `Pending` or `Scheduled`.
pub fn validate_initial(tx: &Transaction) -> Result<(), ValidationError> {
    let consistent = match tx.status {
        TransactionStatus::Pending => tx.scheduled_at.is_none(),
        TransactionStatus::Scheduled => tx.scheduled_at.is_some(),
        _ => false,
    };
    if !consistent {
        return Err(ValidationError::InvalidInitialState(format!(
            "status {} with scheduled_at {:?}",
            tx.status, tx.scheduled_at
        )));
    }
    if tx.transaction_hash.is_some() || tx.executed_at.is_some() {
        return Err(ValidationError::InvalidInitialState(
            "execution fields must be empty".to_string(),
        ));
    }
    Ok(())
}

fn append_note(tx: &mut Transaction, note: &str) {
    if tx.notes.is_empty() {
        tx.notes = note.to_string();
    } else {
        tx.notes.push('\n');
        tx.notes.push_str(note);
    }
}
