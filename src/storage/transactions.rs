//! Transaction store
//!
//! The store is the single source of truth and the only place concurrent
//! tasks coordinate. Every write is one critical section: load the record,
//! apply the lifecycle rule to a copy, journal the copy, then swap it in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;
use super::journal::Journal;
use crate::{
    errors::{EngineError, EngineResult, StorageError, TransitionError},
    lifecycle,
    types::{AccountId, ExecutionReceipt, Transaction, TransactionStatus},
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Inserted { id: Uuid, status: TransactionStatus },
    Updated { id: Uuid, status: TransactionStatus },
    Deleted { id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransactionFilter {
    All,
    Account(AccountId),
    Status(TransactionStatus),
    AccountStatus(AccountId, TransactionStatus),
    Scheduled,
    Due(DateTime<Utc>),
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        match *self {
            TransactionFilter::All => true,
            TransactionFilter::Account(account) => tx.account_id == account,
            TransactionFilter::Status(status) => tx.status == status,
            TransactionFilter::AccountStatus(account, status) => {
                tx.account_id == account && tx.status == status
            }
            TransactionFilter::Scheduled => tx.status == TransactionStatus::Scheduled,
            TransactionFilter::Due(now) => tx.is_due(now),
        }
    }

    /// Scheduled queries run earliest-due first, everything else newest first.
    fn sort(&self, records: &mut [Transaction]) {
        match self {
            TransactionFilter::Scheduled | TransactionFilter::Due(_) => {
                records.sort_by(|a, b| {
                    a.scheduled_at
                        .cmp(&b.scheduled_at)
                        .then_with(|| a.created_at.cmp(&b.created_at))
                });
            }
            _ => records.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
    }
}

pub trait TransactionStore: Send + Sync {
    fn insert(&self, tx: Transaction) -> EngineResult<Uuid>;

    fn get(&self, id: Uuid) -> EngineResult<Transaction>;

    fn update_status(&self, id: Uuid, status: TransactionStatus) -> EngineResult<Transaction>;

    fn update_execution(&self, id: Uuid, receipt: ExecutionReceipt) -> EngineResult<Transaction>;

    /// `Scheduled -> Cancelled`; a `Processing` record is refused with
    /// [`TransitionError::TooLate`] and left untouched.
    fn cancel(&self, id: Uuid) -> EngineResult<Transaction>;

    fn delete(&self, id: Uuid) -> EngineResult<()>;

    /// Point-in-time snapshot of the matching records.
    fn query(&self, filter: TransactionFilter) -> EngineResult<Vec<Transaction>>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    fn query_all(&self) -> EngineResult<Vec<Transaction>> {
        self.query(TransactionFilter::All)
    }

    fn query_by_account(&self, account_id: AccountId) -> EngineResult<Vec<Transaction>> {
        self.query(TransactionFilter::Account(account_id))
    }

    fn query_by_status(&self, status: TransactionStatus) -> EngineResult<Vec<Transaction>> {
        self.query(TransactionFilter::Status(status))
    }

    fn query_scheduled(&self) -> EngineResult<Vec<Transaction>> {
        self.query(TransactionFilter::Scheduled)
    }

    fn query_due(&self, now: DateTime<Utc>) -> EngineResult<Vec<Transaction>> {
        self.query(TransactionFilter::Due(now))
    }

    fn count_by_account(&self, account_id: AccountId) -> EngineResult<usize> {
        Ok(self.query(TransactionFilter::Account(account_id))?.len())
    }

    fn count_by_account_and_status(
        &self,
        account_id: AccountId,
        status: TransactionStatus,
    ) -> EngineResult<usize> {
        Ok(self
            .query(TransactionFilter::AccountStatus(account_id, status))?
            .len())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    Put { tx: Transaction },
    Delete { id: Uuid },
}

#[derive(Debug)]
struct StoreState {
    records: HashMap<Uuid, Transaction>,
    journal: Option<Journal<JournalEntry>>,
}

impl StoreState {
    fn persist(&mut self, entry: &JournalEntry) -> Result<(), StorageError> {
        match self.journal.as_mut() {
            Some(journal) => journal.append(entry),
            None => Ok(()),
        }
    }
}

/// In-memory index backed by an optional append-only journal.
#[derive(Debug)]
pub struct JournaledStore {
    state: Mutex<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl JournaledStore {
    pub fn in_memory() -> Self {
        Self::with_state(StoreState {
            records: HashMap::new(),
            journal: None,
        })
    }

    /// Opens a journal file and rebuilds the index from it.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let (journal, entries) = Journal::<JournalEntry>::open(path)?;

        let mut records = HashMap::new();
        for entry in entries {
            match entry {
                JournalEntry::Put { tx } => {
                    records.insert(tx.id, tx);
                }
                JournalEntry::Delete { id } => {
                    records.remove(&id);
                }
            }
        }

        info!(
            path = %journal.path().display(),
            records = records.len(),
            "Loaded transaction journal"
        );

        Ok(Self::with_state(StoreState {
            records,
            journal: Some(journal),
        }))
    }

    fn with_state(state: StoreState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(state),
            events,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Poisoned)
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn modify<F>(&self, id: Uuid, change: F) -> EngineResult<Transaction>
    where
        F: FnOnce(&mut Transaction) -> Result<(), TransitionError>,
    {
        let mut state = self.lock()?;
        let mut next = state
            .records
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;

        change(&mut next)?;

        state.persist(&JournalEntry::Put { tx: next.clone() })?;
        state.records.insert(id, next.clone());
        drop(state);

        debug!(transaction_id = %id, status = %next.status, "Transaction updated");
        self.notify(StoreEvent::Updated {
            id,
            status: next.status,
        });
        Ok(next)
    }

    /// Rewrites the journal as one entry per live record.
    pub fn compact(&self) -> EngineResult<()> {
        let mut state = self.lock()?;
        let StoreState { records, journal } = &mut *state;
        if let Some(journal) = journal.as_mut() {
            let entries: Vec<JournalEntry> = records
                .values()
                .cloned()
                .map(|tx| JournalEntry::Put { tx })
                .collect();
            journal.rewrite(&entries)?;
            info!(records = entries.len(), "Compacted transaction journal");
        }
        Ok(())
    }
}

impl TransactionStore for JournaledStore {
    fn insert(&self, tx: Transaction) -> EngineResult<Uuid> {
        lifecycle::validate_initial(&tx)?;

        let mut state = self.lock()?;
        if state.records.contains_key(&tx.id) {
            return Err(StorageError::Duplicate(tx.id).into());
        }
        state.persist(&JournalEntry::Put { tx: tx.clone() })?;
        let (id, status) = (tx.id, tx.status);
        state.records.insert(id, tx);
        drop(state);

        info!(transaction_id = %id, status = %status, "Saved transaction");
        self.notify(StoreEvent::Inserted { id, status });
        Ok(id)
    }

    fn get(&self, id: Uuid) -> EngineResult<Transaction> {
        self.lock()?
            .records
            .get(&id)
            .cloned()
            .ok_or(EngineError::NotFound(id))
    }

    fn update_status(&self, id: Uuid, status: TransactionStatus) -> EngineResult<Transaction> {
        self.modify(id, |tx| lifecycle::apply_status(tx, status))
    }

    fn update_execution(&self, id: Uuid, receipt: ExecutionReceipt) -> EngineResult<Transaction> {
        self.modify(id, |tx| lifecycle::apply_receipt(tx, &receipt))
    }

    fn cancel(&self, id: Uuid) -> EngineResult<Transaction> {
        self.modify(id, lifecycle::apply_cancel)
    }

    fn delete(&self, id: Uuid) -> EngineResult<()> {
        let mut state = self.lock()?;
        let status = state
            .records
            .get(&id)
            .map(|tx| tx.status)
            .ok_or(EngineError::NotFound(id))?;
        if status == TransactionStatus::Processing {
            return Err(TransitionError::InFlight(id).into());
        }
        state.persist(&JournalEntry::Delete { id })?;
        state.records.remove(&id);
        drop(state);

        info!(transaction_id = %id, "Deleted transaction");
        self.notify(StoreEvent::Deleted { id });
        Ok(())
    }

    fn query(&self, filter: TransactionFilter) -> EngineResult<Vec<Transaction>> {
        let mut records: Vec<Transaction> = self
            .lock()?
            .records
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        filter.sort(&mut records);
        Ok(records)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
