//! Ledger gateway over the node REST API
//!
//! Submission flow: read the sender's sequence number, have the node encode
//! the signing message, sign it locally, submit, then poll the hash until
//! the node reports a committed transaction or the finality window closes.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use super::LedgerGateway;
use crate::{
    config::Config,
    errors::LedgerError,
    session::Identity,
    types::{AccountAddress, EntryFunctionCall, FinalityStatus, SubmissionOutcome, TxHash},
};

const COIN_STORE_RESOURCE: &str = "0x1::coin::CoinStore<0x1::aptos_coin::AptosCoin>";
const REQUEST_TIMEOUT_SECS: u64 = 10;

pub struct RestLedgerGateway {
    client: reqwest::Client,
    base_url: String,
    max_gas_amount: u64,
    gas_unit_price: u64,
    expiration_secs: u64,
    finality_timeout: Duration,
    poll_interval: Duration,
}

impl RestLedgerGateway {
    pub fn new(config: &Config) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.node_url.trim_end_matches('/').to_string(),
            max_gas_amount: config.max_gas_amount,
            gas_unit_price: config.gas_unit_price,
            expiration_secs: config.tx_expiration_secs,
            finality_timeout: config.finality_timeout(),
            poll_interval: config.finality_poll_interval(),
        })
    }

    async fn sequence_number(&self, address: &AccountAddress) -> Result<u64, LedgerError> {
        let url = format!("{}/accounts/{}", self.base_url, address);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: Value = response.json().await?;
        parse_u64(&body, "sequence_number").ok_or_else(|| LedgerError::Transport {
            message: "account response has no sequence_number".to_string(),
        })
    }

    fn unsigned_request(
        &self,
        sender: &AccountAddress,
        sequence_number: u64,
        call: &EntryFunctionCall,
    ) -> Value {
        let expiration = chrono::Utc::now().timestamp().max(0) as u64 + self.expiration_secs;
        json!({
            "sender": sender.to_string(),
            "sequence_number": sequence_number.to_string(),
            "max_gas_amount": self.max_gas_amount.to_string(),
            "gas_unit_price": self.gas_unit_price.to_string(),
            "expiration_timestamp_secs": expiration.to_string(),
            "payload": {
                "type": "entry_function_payload",
                "function": call.function,
                "type_arguments": call.type_args,
                "arguments": call.args,
            }
        })
    }

    async fn signing_message(&self, request: &Value) -> Result<Vec<u8>, LedgerError> {
        let url = format!("{}/transactions/encode_submission", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let encoded: String = response.json().await?;
        alloy::hex::decode(&encoded).map_err(|e| LedgerError::Transport {
            message: format!("invalid signing message: {}", e),
        })
    }

    async fn submit_signed(&self, request: &Value) -> Result<TxHash, LedgerError> {
        let url = format!("{}/transactions", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        // From here on the node holds the payload; every failure is ambiguous.
        let body: Value = response.json().await.map_err(|e| LedgerError::MalformedResponse {
            detail: format!("unreadable submission response: {}", e),
            hash: None,
        })?;
        body.get("hash")
            .and_then(Value::as_str)
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| LedgerError::MalformedResponse {
                detail: "submission response has no valid hash".to_string(),
                hash: None,
            })
    }

    async fn fetch_by_hash(&self, hash: &TxHash) -> Result<Option<Value>, LedgerError> {
        let url = format!("{}/transactions/by_hash/{}", self.base_url, hash);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(LedgerError::Transport {
                message: format!("transaction lookup returned {}", response.status()),
            });
        }
        Ok(Some(response.json().await?))
    }

    async fn wait_for_finality(&self, hash: TxHash) -> Result<SubmissionOutcome, LedgerError> {
        let poll = async {
            loop {
                match self.fetch_by_hash(&hash).await {
                    Ok(Some(tx)) if !is_pending(&tx) => return parse_outcome(hash, &tx),
                    Ok(_) => debug!(%hash, "Transaction not final yet"),
                    Err(e) => warn!(%hash, error = %e, "Finality poll failed"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        tokio::select! {
            result = poll => result,
            _ = tokio::time::sleep(self.finality_timeout) => Err(LedgerError::Timeout {
                waited: self.finality_timeout,
                hash: Some(hash),
            }),
        }
    }
}

#[async_trait]
impl LedgerGateway for RestLedgerGateway {
    async fn submit(
        &self,
        identity: &Identity,
        call: &EntryFunctionCall,
    ) -> Result<SubmissionOutcome, LedgerError> {
        let sender = identity.address();
        info!(function = %call.function, sender = %sender, "📤 Submitting entry function");

        let sequence_number = self.sequence_number(sender).await?;
        let mut request = self.unsigned_request(sender, sequence_number, call);
        let message = self.signing_message(&request).await?;
        let signature = identity.sign(&message);
        request["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": identity.public_key_hex(),
            "signature": alloy::hex::encode_prefixed(signature),
        });

        let hash = self.submit_signed(&request).await?;
        let accepted_at = chrono::Utc::now();
        info!(%hash, "📡 Transaction accepted, waiting for finality");

        let mut outcome = self.wait_for_finality(hash).await?;
        outcome.accepted_at = Some(accepted_at);
        if !outcome.success {
            warn!(%hash, vm_status = %outcome.vm_status, "Transaction aborted on-chain");
            return Err(LedgerError::RemoteRejected {
                reason: outcome.vm_status,
                hash: Some(hash),
            });
        }

        info!(
            %hash,
            gas_used = outcome.gas_used,
            gas_unit_price = outcome.gas_unit_price,
            "✅ Transaction finalized"
        );
        Ok(outcome)
    }

    async fn balance(&self, address: &AccountAddress) -> Result<u64, LedgerError> {
        let url = format!("{}/accounts/{}/resource/{}", self.base_url, address, COIN_STORE_RESOURCE);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            // Account has never held the coin.
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: Value = response.json().await?;
        body.pointer("/data/coin/value")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64()))
            .ok_or_else(|| LedgerError::Transport {
                message: "coin store response has no data.coin.value".to_string(),
            })
    }

    async fn lookup(&self, hash: &TxHash) -> Result<FinalityStatus, LedgerError> {
        match self.fetch_by_hash(hash).await? {
            None => Ok(FinalityStatus::Unknown),
            Some(tx) if is_pending(&tx) => Ok(FinalityStatus::Pending),
            Some(tx) => parse_outcome(*hash, &tx).map(FinalityStatus::Final),
        }
    }
}

fn is_pending(tx: &Value) -> bool {
    tx.get("type").and_then(Value::as_str) == Some("pending_transaction")
}

fn parse_u64(body: &Value, field: &str) -> Option<u64> {
    let value = body.get(field)?;
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_u64())
}

fn parse_outcome(hash: TxHash, tx: &Value) -> Result<SubmissionOutcome, LedgerError> {
    let malformed = |detail: &str| LedgerError::MalformedResponse {
        detail: detail.to_string(),
        hash: Some(hash),
    };

    let success = tx
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| malformed("committed transaction has no success flag"))?;
    let gas_used = parse_u64(tx, "gas_used").ok_or_else(|| malformed("missing or invalid gas_used"))?;
    let gas_unit_price =
        parse_u64(tx, "gas_unit_price").ok_or_else(|| malformed("missing or invalid gas_unit_price"))?;
    let vm_status = tx
        .get("vm_status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(SubmissionOutcome {
        hash,
        gas_used,
        gas_unit_price,
        finalized: true,
        success,
        vm_status,
        accepted_at: None,
    })
}

async fn rejection(response: reqwest::Response) -> LedgerError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    warn!("⚠️ Ledger node returned error status {}: {}", status, message);
    LedgerError::RemoteRejected {
        reason: format!("{}: {}", status, message),
        hash: None,
    }
}
