//! Transaction records and their lifecycle status

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use super::{AccountAddress, TxHash};

pub type AccountId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Scheduled,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Pending,
        TransactionStatus::Scheduled,
        TransactionStatus::Processing,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
    ];
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Scheduled => "Scheduled",
            TransactionStatus::Processing => "Processing",
            TransactionStatus::Completed => "Completed",
            TransactionStatus::Failed => "Failed",
            TransactionStatus::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// A payment intent, immediate or scheduled.
///
/// Records are only ever changed through the store, which applies the
/// lifecycle rules in [`crate::lifecycle`] before persisting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: AccountId,
    pub from_address: AccountAddress,
    pub to_address: AccountAddress,
    pub amount: Decimal,
    pub asset_type: String,
    pub transaction_hash: Option<TxHash>,
    pub status: TransactionStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub executed_at: Option<DateTime<Utc>>,
    pub gas_price: Option<u64>,
    pub gas_fee: Option<u64>,
    pub notes: String,
}

/// A transfer that passed validation and can be turned into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferDraft {
    pub account_id: AccountId,
    pub from_address: AccountAddress,
    pub to_address: AccountAddress,
    pub amount: Decimal,
    pub asset_type: String,
    pub notes: String,
}

impl Transaction {
    pub fn immediate(draft: TransferDraft, now: DateTime<Utc>) -> Self {
        Self::from_draft(draft, TransactionStatus::Pending, now, None)
    }

    pub fn scheduled(draft: TransferDraft, now: DateTime<Utc>, scheduled_at: DateTime<Utc>) -> Self {
        Self::from_draft(draft, TransactionStatus::Scheduled, now, Some(scheduled_at))
    }

    fn from_draft(
        draft: TransferDraft,
        status: TransactionStatus,
        now: DateTime<Utc>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: draft.account_id,
            from_address: draft.from_address,
            to_address: draft.to_address,
            amount: draft.amount,
            asset_type: draft.asset_type,
            transaction_hash: None,
            status,
            created_at: now,
            scheduled_at,
            executed_at: None,
            gas_price: None,
            gas_fee: None,
            notes: draft.notes,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_at.is_some()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TransactionStatus::Scheduled
            && self.scheduled_at.is_some_and(|at| at <= now)
    }
}

/// Bookkeeping applied to a record after a ledger call.
///
/// A receipt can record an accepted hash, a final outcome or a failure note;
/// `status: None` leaves the status unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionReceipt {
    pub status: Option<TransactionStatus>,
    pub transaction_hash: Option<TxHash>,
    pub executed_at: Option<DateTime<Utc>>,
    pub gas_price: Option<u64>,
    pub gas_fee: Option<u64>,
    pub note: Option<String>,
}

impl ExecutionReceipt {
    /// Submission accepted by the network, outcome not yet known.
    pub fn accepted(hash: TxHash, executed_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(TransactionStatus::Processing),
            transaction_hash: Some(hash),
            executed_at: Some(executed_at),
            ..Default::default()
        }
    }

    pub fn completed(
        hash: Option<TxHash>,
        executed_at: Option<DateTime<Utc>>,
        gas_price: u64,
        gas_fee: u64,
    ) -> Self {
        Self {
            status: Some(TransactionStatus::Completed),
            transaction_hash: hash,
            executed_at,
            gas_price: Some(gas_price),
            gas_fee: Some(gas_fee),
            note: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: Some(TransactionStatus::Failed),
            note: Some(reason.into()),
            ..Default::default()
        }
    }
}
