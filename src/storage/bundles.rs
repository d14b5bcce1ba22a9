//! Trade bundle log
//!
//! Ledger-of-record for trade pipeline runs. Records are appended once and
//! never updated.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;
use super::journal::Journal;
use crate::{
    errors::{EngineResult, StorageError},
    types::BundleTransaction,
};

struct BundleState {
    records: Vec<BundleTransaction>,
    journal: Option<Journal<BundleTransaction>>,
}

pub struct BundleLog {
    state: Mutex<BundleState>,
}

impl BundleLog {
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(BundleState {
                records: Vec::new(),
                journal: None,
            }),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let (journal, records) = Journal::open(path)?;
        info!(
            path = %journal.path().display(),
            records = records.len(),
            "Loaded bundle log"
        );
        Ok(Self {
            state: Mutex::new(BundleState {
                records,
                journal: Some(journal),
            }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BundleState>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn append(&self, bundle: &BundleTransaction) -> EngineResult<()> {
        let mut state = self.lock()?;
        if state.records.iter().any(|b| b.id == bundle.id) {
            return Err(StorageError::Duplicate(bundle.id).into());
        }
        if let Some(journal) = state.journal.as_mut() {
            journal.append(bundle)?;
        }
        state.records.push(bundle.clone());
        drop(state);

        info!(
            bundle_id = %bundle.id,
            success = bundle.success,
            leverage = bundle.leverage,
            gas_fee = ?bundle.gas_fee,
            "Saved trade bundle"
        );
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> EngineResult<Option<BundleTransaction>> {
        Ok(self.lock()?.records.iter().find(|b| b.id == id).cloned())
    }

    /// All bundles, newest first.
    pub fn list(&self) -> EngineResult<Vec<BundleTransaction>> {
        let mut records = self.lock()?.records.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    pub fn len(&self) -> EngineResult<usize> {
        Ok(self.lock()?.records.len())
    }

    pub fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.len()? == 0)
    }
}
