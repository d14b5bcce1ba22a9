//! Shared fixtures for the integration suites: a scripted ledger gateway, a
//! store wrapper that can be made to fail, and a wired-up service.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;
use wallet_tx_engine::{
    errors::{EngineResult, LedgerError, StorageError},
    network::LedgerGateway,
    session::{AccountSession, Ed25519Signer, Identity, MemoryKeyVault},
    storage::{BundleLog, JournaledStore, StoreEvent, TransactionFilter, TransactionStore},
    types::{
        AccountAddress, EntryFunctionCall, ExecutionReceipt, FinalityStatus, SubmissionOutcome,
        Transaction, TransactionStatus, TxHash,
    },
    utils::ManualClock,
    validation::TransferRequest,
    Config, TransferService,
};

pub const SEED: [u8; 32] = [7u8; 32];
pub const TRADE_MODULE: &str = "0xcafe::basket";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

pub fn sender() -> AccountAddress {
    Ed25519Signer::from_seed(&SEED).account_address()
}

pub fn recipient() -> String {
    format!("0x{}", "bb".repeat(32))
}

pub fn hash(byte: u8) -> TxHash {
    TxHash::from_bytes([byte; 32])
}

pub fn outcome(hash: TxHash, gas_used: u64, gas_unit_price: u64) -> SubmissionOutcome {
    SubmissionOutcome {
        hash,
        gas_used,
        gas_unit_price,
        finalized: true,
        success: true,
        vm_status: "Executed successfully".to_string(),
        accepted_at: None,
    }
}

pub fn transfer(amount: &str) -> TransferRequest {
    TransferRequest::new(1, sender().to_string(), recipient(), amount, "APT")
}

pub fn test_config() -> Config {
    Config {
        trade_module: Some(TRADE_MODULE.to_string()),
        ..Config::default()
    }
}

/// Ledger gateway driven by queued outcomes. An empty queue means success.
#[derive(Default)]
pub struct MockGateway {
    submits: Mutex<VecDeque<Result<SubmissionOutcome, LedgerError>>>,
    lookups: Mutex<VecDeque<Result<FinalityStatus, LedgerError>>>,
    calls: Mutex<Vec<EntryFunctionCall>>,
    balance_calls: AtomicUsize,
    balance_units: AtomicU64,
    next_hash: AtomicU8,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_hash: AtomicU8::new(0x10),
            ..Default::default()
        })
    }

    pub fn push_submit(&self, result: Result<SubmissionOutcome, LedgerError>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub fn push_lookup(&self, result: Result<FinalityStatus, LedgerError>) {
        self.lookups.lock().unwrap().push_back(result);
    }

    pub fn set_balance(&self, units: u64) {
        self.balance_units.store(units, Ordering::SeqCst);
    }

    /// Makes the next submissions wait until [`MockGateway::release`].
    pub fn hold_submissions(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub async fn wait_for_submission(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn calls(&self) -> Vec<EntryFunctionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn submit(
        &self,
        _identity: &Identity,
        call: &EntryFunctionCall,
    ) -> Result<SubmissionOutcome, LedgerError> {
        self.calls.lock().unwrap().push(call.clone());
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }

        let scripted = self.submits.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            let byte = self.next_hash.fetch_add(1, Ordering::SeqCst);
            Ok(outcome(hash(byte), 10, 100))
        })
    }

    async fn balance(&self, _address: &AccountAddress) -> Result<u64, LedgerError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance_units.load(Ordering::SeqCst))
    }

    async fn lookup(&self, _hash: &TxHash) -> Result<FinalityStatus, LedgerError> {
        self.lookups
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(FinalityStatus::Unknown))
    }
}

/// Store that delegates to an in-memory store until told to fail writes.
pub struct FlakyStore {
    inner: JournaledStore,
    fail_execution_updates: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: JournaledStore::in_memory(),
            fail_execution_updates: AtomicBool::new(false),
        })
    }

    pub fn fail_execution_updates(&self) {
        self.fail_execution_updates.store(true, Ordering::SeqCst);
    }

    fn disk_full() -> StorageError {
        StorageError::Io {
            path: PathBuf::from("transactions/journal.jsonl"),
            source: std::io::Error::other("no space left on device"),
        }
    }
}

impl TransactionStore for FlakyStore {
    fn insert(&self, tx: Transaction) -> EngineResult<Uuid> {
        self.inner.insert(tx)
    }

    fn get(&self, id: Uuid) -> EngineResult<Transaction> {
        self.inner.get(id)
    }

    fn update_status(&self, id: Uuid, status: TransactionStatus) -> EngineResult<Transaction> {
        self.inner.update_status(id, status)
    }

    fn update_execution(&self, id: Uuid, receipt: ExecutionReceipt) -> EngineResult<Transaction> {
        if self.fail_execution_updates.load(Ordering::SeqCst) {
            return Err(Self::disk_full().into());
        }
        self.inner.update_execution(id, receipt)
    }

    fn cancel(&self, id: Uuid) -> EngineResult<Transaction> {
        self.inner.cancel(id)
    }

    fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.inner.delete(id)
    }

    fn query(&self, filter: TransactionFilter) -> EngineResult<Vec<Transaction>> {
        self.inner.query(filter)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.subscribe()
    }
}

pub struct Harness {
    pub service: TransferService,
    pub gateway: Arc<MockGateway>,
    pub store: Arc<dyn TransactionStore>,
    pub bundles: Arc<BundleLog>,
    pub clock: Arc<ManualClock>,
    pub session: Arc<AccountSession>,
}

pub async fn harness() -> Harness {
    harness_with_store(Arc::new(JournaledStore::in_memory())).await
}

/// Service with the signing identity for [`sender`] already active.
pub async fn harness_with_store(store: Arc<dyn TransactionStore>) -> Harness {
    let config = test_config();
    let gateway = MockGateway::new();
    let bundles = Arc::new(BundleLog::in_memory());
    let clock = Arc::new(ManualClock::new(start_time()));
    let session = Arc::new(AccountSession::new(
        Arc::new(MemoryKeyVault::with_seed(SEED)),
        config.native_decimals,
    ));
    session.load().await.unwrap();

    let service = TransferService::new(
        config,
        Arc::clone(&store),
        Arc::clone(&bundles),
        gateway.clone(),
        Arc::clone(&session),
        clock.clone(),
    );

    Harness {
        service,
        gateway,
        store,
        bundles,
        clock,
        session,
    }
}
