//! Trade pipeline requests and the bundle ledger-of-record

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use super::{AccountAddress, SubmissionOutcome, TxHash};
use crate::errors::LedgerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWeight {
    pub symbol: String,
    pub weight: Decimal,
}

impl AssetWeight {
    pub fn new(symbol: impl Into<String>, weight: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            weight,
        }
    }
}

/// One leveraged basket trade.
///
/// `prices[i]` is the price used to size `assets[i]`; weights must sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub assets: Vec<AssetWeight>,
    pub prices: Vec<Decimal>,
    pub collateral: Decimal,
    pub leverage: u32,
    pub is_long: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStep {
    Collateralize,
    CreateBucket,
    UpdateOracle,
    OpenPosition,
    ClosePosition,
}

impl TradeStep {
    pub const ALL: [TradeStep; 5] = [
        TradeStep::Collateralize,
        TradeStep::CreateBucket,
        TradeStep::UpdateOracle,
        TradeStep::OpenPosition,
        TradeStep::ClosePosition,
    ];

    /// 1-based position in the pipeline.
    pub fn number(self) -> usize {
        match self {
            TradeStep::Collateralize => 1,
            TradeStep::CreateBucket => 2,
            TradeStep::UpdateOracle => 3,
            TradeStep::OpenPosition => 4,
            TradeStep::ClosePosition => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TradeStep::Collateralize => "collateralize",
            TradeStep::CreateBucket => "create-bucket",
            TradeStep::UpdateOracle => "update-oracle",
            TradeStep::OpenPosition => "open-position",
            TradeStep::ClosePosition => "close-position",
        }
    }

    /// Entry function name inside the trade module.
    pub fn entry_function(self) -> &'static str {
        match self {
            TradeStep::Collateralize => "collateralize",
            TradeStep::CreateBucket => "create_bucket",
            TradeStep::UpdateOracle => "update_oracle",
            TradeStep::OpenPosition => "open_position",
            TradeStep::ClosePosition => "close_position",
        }
    }
}

impl fmt::Display for TradeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReceipt {
    pub step: TradeStep,
    pub transaction_hash: Option<TxHash>,
    pub gas_fee: Option<u64>,
    pub error: Option<String>,
}

impl StepReceipt {
    pub fn succeeded(step: TradeStep, outcome: &SubmissionOutcome) -> Self {
        Self {
            step,
            transaction_hash: Some(outcome.hash),
            gas_fee: Some(outcome.gas_fee()),
            error: None,
        }
    }

    pub fn failed(step: TradeStep, error: &LedgerError) -> Self {
        Self {
            step,
            transaction_hash: error.hash().copied(),
            gas_fee: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Append-only record of one trade pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleTransaction {
    pub id: Uuid,
    pub account_address: Option<AccountAddress>,
    pub weights: Vec<AssetWeight>,
    pub prices: Vec<Decimal>,
    pub collateral: Decimal,
    pub leverage: u32,
    pub is_long: bool,
    pub transaction_hash: Option<TxHash>,
    pub gas_fee: Option<u64>,
    pub success: bool,
    pub message: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TradeReport {
    pub bundle: BundleTransaction,
    pub steps: Vec<StepReceipt>,
}

impl TradeReport {
    pub fn failed_step(&self) -> Option<TradeStep> {
        self.steps.iter().find(|s| !s.is_success()).map(|s| s.step)
    }

    pub fn attempted(&self) -> Vec<TradeStep> {
        self.steps.iter().map(|s| s.step).collect()
    }
}
