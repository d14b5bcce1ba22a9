//! Multi-step trade pipeline
//!
//! collateralize -> create-bucket -> update-oracle -> open-position ->
//! close-position. Each step is its own on-chain transaction and must be
//! final and successful before the next one is attempted. The first failure ends the run;
//! earlier steps are not compensated because they cannot be undone locally.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use crate::{
    errors::{EngineResult, LedgerError, ValidationError},
    network::LedgerGateway,
    session::AccountSession,
    storage::BundleLog,
    types::{
        BundleTransaction, EntryFunctionCall, StepReceipt, SubmissionOutcome, TradeReport,
        TradeRequest, TradeStep, NATIVE_COIN_TYPE,
    },
    utils::{to_base_units, Clock},
    validation::{validate_trade, PRICE_DECIMALS, WEIGHT_DECIMALS},
};

pub struct TradePipeline {
    gateway: Arc<dyn LedgerGateway>,
    session: Arc<AccountSession>,
    bundles: Arc<BundleLog>,
    clock: Arc<dyn Clock>,
    module: Option<String>,
    decimals: u32,
    max_leverage: u32,
}

impl TradePipeline {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        session: Arc<AccountSession>,
        bundles: Arc<BundleLog>,
        clock: Arc<dyn Clock>,
        module: Option<String>,
        decimals: u32,
        max_leverage: u32,
    ) -> Self {
        Self {
            gateway,
            session,
            bundles,
            clock,
            module,
            decimals,
            max_leverage,
        }
    }

    /// Runs the five steps in order and appends exactly one bundle record.
    ///
    /// Invalid requests are rejected before any remote call and leave no
    /// record. Once the request is valid, a ledger failure does not make this
    /// return `Err`: it is reported through `bundle.success` and the failed
    /// step receipt.
    pub async fn run(&self, request: TradeRequest) -> EngineResult<TradeReport> {
        validate_trade(&request, self.max_leverage)?;
        let module = self
            .module
            .as_deref()
            .ok_or(ValidationError::TradeModuleNotConfigured)?;
        let calls = TradeStep::ALL
            .iter()
            .map(|step| -> EngineResult<(TradeStep, EntryFunctionCall)> {
                Ok((*step, self.step_call(module, *step, &request)?))
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let identity = self.session.require_identity().await;
        let account_address = identity.as_ref().ok().map(|i| *i.address());
        let mut steps = Vec::with_capacity(calls.len());
        let mut failure: Option<(TradeStep, LedgerError)> = None;

        match identity {
            Err(e) => failure = Some((TradeStep::Collateralize, e)),
            Ok(identity) => {
                for (step, call) in &calls {
                    info!(step = step.number(), name = step.name(), "Submitting trade step");
                    let submitted = self.gateway.submit(&identity, call).await;
                    match submitted.and_then(SubmissionOutcome::confirmed) {
                        Ok(outcome) => steps.push(StepReceipt::succeeded(*step, &outcome)),
                        Err(e) => {
                            steps.push(StepReceipt::failed(*step, &e));
                            failure = Some((*step, e));
                            break;
                        }
                    }
                }
            }
        }

        let last = steps.last().filter(|s| s.is_success());
        let (success, message) = match &failure {
            None => (true, "Trade completed: all 5 steps succeeded".to_string()),
            Some((step, e)) if steps.is_empty() => {
                (false, format!("Trade aborted before {}: {}", step, e))
            }
            Some((step, e)) => (false, format!("Trade failed at {}: {}", step, e)),
        };

        let bundle = BundleTransaction {
            id: Uuid::new_v4(),
            account_address,
            weights: request.assets.clone(),
            prices: request.prices.clone(),
            collateral: request.collateral,
            leverage: request.leverage,
            is_long: request.is_long,
            transaction_hash: if success { last.and_then(|s| s.transaction_hash) } else { None },
            gas_fee: if success { last.and_then(|s| s.gas_fee) } else { None },
            success,
            message,
            created_at: self.clock.now(),
        };
        self.bundles.append(&bundle)?;

        if success {
            info!(bundle_id = %bundle.id, hash = ?bundle.transaction_hash, "✅ Trade pipeline completed");
        } else {
            error!(bundle_id = %bundle.id, message = %bundle.message, "❌ Trade pipeline aborted");
        }

        Ok(TradeReport { bundle, steps })
    }

    fn step_call(
        &self,
        module: &str,
        step: TradeStep,
        request: &TradeRequest,
    ) -> EngineResult<EntryFunctionCall> {
        let function = format!("{}::{}", module, step.entry_function());
        let symbols: Vec<Value> = request.assets.iter().map(|a| json!(a.symbol)).collect();

        let (type_args, args) = match step {
            TradeStep::Collateralize => (
                vec![NATIVE_COIN_TYPE.to_string()],
                vec![json!(to_base_units(request.collateral, self.decimals)?.to_string())],
            ),
            TradeStep::CreateBucket => {
                let weights = request
                    .assets
                    .iter()
                    .map(|a| -> EngineResult<Value> {
                        Ok(json!(to_base_units(a.weight, WEIGHT_DECIMALS)?.to_string()))
                    })
                    .collect::<EngineResult<Vec<Value>>>()?;
                (Vec::new(), vec![json!(symbols), json!(weights)])
            }
            TradeStep::UpdateOracle => {
                let prices = request
                    .prices
                    .iter()
                    .map(|p| -> EngineResult<Value> {
                        Ok(json!(to_base_units(*p, PRICE_DECIMALS)?.to_string()))
                    })
                    .collect::<EngineResult<Vec<Value>>>()?;
                (Vec::new(), vec![json!(symbols), json!(prices)])
            }
            TradeStep::OpenPosition => (
                vec![NATIVE_COIN_TYPE.to_string()],
                vec![json!(request.leverage.to_string()), json!(request.is_long)],
            ),
            TradeStep::ClosePosition => (vec![NATIVE_COIN_TYPE.to_string()], Vec::new()),
        };

        Ok(EntryFunctionCall::new(function, type_args, args))
    }
}
