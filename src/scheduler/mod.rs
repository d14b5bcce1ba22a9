//! Due-transaction scheduler
//!
//! Each tick claims every due `Scheduled` record (`Scheduled -> Processing`)
//! and hands it to the executor as its own task, so one slow submission never
//! delays the next scan.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use crate::{
    errors::{EngineError, EngineResult},
    execution::TransferExecutor,
    storage::TransactionStore,
    types::Transaction,
    utils::Clock,
};

pub type DispatchHandle = JoinHandle<EngineResult<Transaction>>;

pub struct Scheduler {
    store: Arc<dyn TransactionStore>,
    executor: Arc<TransferExecutor>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        executor: Arc<TransferExecutor>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            executor,
            clock,
            interval,
        }
    }

    pub fn tick(&self) -> EngineResult<Vec<DispatchHandle>> {
        self.tick_at(self.clock.now())
    }

    /// One scan at `now`. Returns a handle per dispatched transaction.
    pub fn tick_at(&self, now: DateTime<Utc>) -> EngineResult<Vec<DispatchHandle>> {
        let due = self.store.query_due(now)?;
        if due.is_empty() {
            debug!(%now, "No scheduled transactions due");
            return Ok(Vec::new());
        }

        let mut handles = Vec::with_capacity(due.len());
        for tx in due {
            let (claimed, claim) = match self.executor.claim_at(tx.id, now) {
                Ok(claimed) => claimed,
                // Cancelled, deleted or claimed elsewhere since the scan.
                Err(EngineError::Transition(e)) => {
                    warn!(transaction_id = %tx.id, error = %e, "Skipping scheduled transaction");
                    continue;
                }
                Err(EngineError::NotFound(id)) => {
                    warn!(transaction_id = %id, "Scheduled transaction vanished before dispatch");
                    continue;
                }
                Err(e) => return Err(e),
            };

            info!(
                transaction_id = %claimed.id,
                scheduled_at = ?claimed.scheduled_at,
                "⏰ Dispatching due transaction"
            );
            let executor = Arc::clone(&self.executor);
            handles.push(tokio::spawn(async move {
                let _claim = claim;
                let id = claimed.id;
                let result = executor.run_claimed(claimed).await;
                if let Err(e) = &result {
                    error!(transaction_id = %id, error = %e, "Scheduled transaction failed");
                }
                result
            }));
        }
        Ok(handles)
    }

    /// Scans every `interval` until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.interval.as_millis() as u64, "Scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("Scheduler tick error: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping scheduler...");
                        break;
                    }
                }
            }
        }
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
