//! Transfer service: the one handle a UI shell holds
//!
//! Creation is validated here, so malformed input never becomes a record and
//! never reaches the executor.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;
use crate::{
    config::Config,
    errors::EngineResult,
    execution::{ReconcileSummary, Reconciler, TradePipeline, TransferExecutor},
    network::LedgerGateway,
    scheduler::Scheduler,
    session::AccountSession,
    storage::{BundleLog, JournaledStore, StoreEvent, TransactionStore},
    types::{AccountId, BundleTransaction, TradeReport, TradeRequest, Transaction, TransactionStatus},
    utils::Clock,
    validation::{validate_schedule, validate_transfer, TransferRequest},
};

pub struct TransferService {
    config: Config,
    store: Arc<dyn TransactionStore>,
    bundles: Arc<BundleLog>,
    session: Arc<AccountSession>,
    clock: Arc<dyn Clock>,
    executor: Arc<TransferExecutor>,
    pipeline: TradePipeline,
    scheduler: Arc<Scheduler>,
    reconciler: Reconciler,
}

impl TransferService {
    pub fn new(
        config: Config,
        store: Arc<dyn TransactionStore>,
        bundles: Arc<BundleLog>,
        gateway: Arc<dyn LedgerGateway>,
        session: Arc<AccountSession>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let executor = Arc::new(TransferExecutor::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::clone(&session),
            Arc::clone(&clock),
            config.transfer_function.clone(),
            config.native_decimals,
        ));
        let pipeline = TradePipeline::new(
            Arc::clone(&gateway),
            Arc::clone(&session),
            Arc::clone(&bundles),
            Arc::clone(&clock),
            config.trade_module.clone(),
            config.native_decimals,
            config.max_leverage,
        );
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&store),
            Arc::clone(&executor),
            Arc::clone(&clock),
            config.scheduler_interval(),
        ));
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            gateway,
            Arc::clone(executor.claims()),
        );

        Self {
            config,
            store,
            bundles,
            session,
            clock,
            executor,
            pipeline,
            scheduler,
            reconciler,
        }
    }

    /// Opens the journals under `config.data_dir`.
    pub fn open(
        config: Config,
        gateway: Arc<dyn LedgerGateway>,
        session: Arc<AccountSession>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        let data_dir = Path::new(&config.data_dir);
        let store = Arc::new(JournaledStore::open(data_dir.join("transactions/journal.jsonl"))?);
        let bundles = Arc::new(BundleLog::open(data_dir.join("bundles/bundles.jsonl"))?);
        Ok(Self::new(config, store, bundles, gateway, session, clock))
    }

    pub fn session(&self) -> &Arc<AccountSession> {
        &self.session
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn create_transfer(&self, request: TransferRequest) -> EngineResult<Transaction> {
        let draft = validate_transfer(&request, &self.config.native_asset, self.config.native_decimals)?;
        let tx = Transaction::immediate(draft, self.clock.now());
        self.store.insert(tx.clone())?;
        Ok(tx)
    }

    pub fn schedule_transfer(
        &self,
        request: TransferRequest,
        scheduled_at: DateTime<Utc>,
    ) -> EngineResult<Transaction> {
        let now = self.clock.now();
        validate_schedule(scheduled_at, now)?;
        let draft = validate_transfer(&request, &self.config.native_asset, self.config.native_decimals)?;
        let tx = Transaction::scheduled(draft, now, scheduled_at);
        self.store.insert(tx.clone())?;
        info!(transaction_id = %tx.id, %scheduled_at, "Scheduled transfer");
        Ok(tx)
    }

    /// Creates an immediate transfer and executes it.
    pub async fn send_now(&self, request: TransferRequest) -> EngineResult<Transaction> {
        let tx = self.create_transfer(request)?;
        self.executor.execute(tx.id).await
    }

    /// Executes a `Pending` record, or a `Scheduled` one that is already due.
    pub async fn execute(&self, id: Uuid) -> EngineResult<Transaction> {
        self.executor.execute(id).await
    }

    pub fn cancel_scheduled(&self, id: Uuid) -> EngineResult<Transaction> {
        let cancelled = self.store.cancel(id)?;
        info!(transaction_id = %id, "Cancelled scheduled transfer");
        Ok(cancelled)
    }

    pub fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.store.delete(id)
    }

    pub fn transaction(&self, id: Uuid) -> EngineResult<Transaction> {
        self.store.get(id)
    }

    pub fn transactions(&self) -> EngineResult<Vec<Transaction>> {
        self.store.query_all()
    }

    pub fn transactions_for_account(&self, account_id: AccountId) -> EngineResult<Vec<Transaction>> {
        self.store.query_by_account(account_id)
    }

    pub fn transactions_with_status(&self, status: TransactionStatus) -> EngineResult<Vec<Transaction>> {
        self.store.query_by_status(status)
    }

    pub fn scheduled_transactions(&self) -> EngineResult<Vec<Transaction>> {
        self.store.query_scheduled()
    }

    pub fn get_due_scheduled_transactions(&self, now: DateTime<Utc>) -> EngineResult<Vec<Transaction>> {
        self.store.query_due(now)
    }

    pub fn count_for_account(&self, account_id: AccountId) -> EngineResult<usize> {
        self.store.count_by_account(account_id)
    }

    pub fn count_for_account_with_status(
        &self,
        account_id: AccountId,
        status: TransactionStatus,
    ) -> EngineResult<usize> {
        self.store.count_by_account_and_status(account_id, status)
    }

    pub async fn trade(&self, request: TradeRequest) -> EngineResult<TradeReport> {
        self.pipeline.run(request).await
    }

    pub fn bundles(&self) -> EngineResult<Vec<BundleTransaction>> {
        self.bundles.list()
    }

    pub fn start_scheduler(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        Arc::clone(&self.scheduler).spawn(shutdown)
    }

    /// Settles `Processing` records left behind by an earlier run. Records
    /// this service is executing right now are reported as in flight and
    /// left untouched, so it is safe to call while the scheduler runs.
    pub async fn reconcile_interrupted(&self) -> EngineResult<ReconcileSummary> {
        self.reconciler.reconcile_interrupted().await
    }
}
