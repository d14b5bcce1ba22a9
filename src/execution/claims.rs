//! Records claimed for execution by this process
//!
//! A claim is held from just before `-> Processing` is written until the
//! executor has settled the record. Reconciliation skips held ids: their
//! `Processing` status is live, not left over from a crash.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct ClaimRegistry {
    held: Mutex<HashMap<Uuid, usize>>,
}

impl ClaimRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn held(&self) -> MutexGuard<'_, HashMap<Uuid, usize>> {
        // Counters stay consistent even if a holder panicked.
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Marks `id` as claimed until the returned guard drops.
    pub fn hold(self: &Arc<Self>, id: Uuid) -> ClaimGuard {
        *self.held().entry(id).or_insert(0) += 1;
        ClaimGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    pub fn is_held(&self, id: Uuid) -> bool {
        self.held().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.held().len()
    }

    pub fn is_empty(&self) -> bool {
        self.held().is_empty()
    }
}

#[derive(Debug)]
pub struct ClaimGuard {
    registry: Arc<ClaimRegistry>,
    id: Uuid,
}

impl ClaimGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let mut held = self.registry.held();
        if let Some(count) = held.get_mut(&self.id) {
            *count -= 1;
            if *count == 0 {
                held.remove(&self.id);
            }
        }
    }
}
