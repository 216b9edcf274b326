//! # Record Locks
//!
//! Arena di lock per-record: `RecordId → Arc<Mutex<()>>`.
//!
//! - Le entry vengono create alla prima richiesta di un record
//! - Quando l'ultimo guard viene rilasciato l'entry viene rimossa
//! - Record diversi non si bloccano mai a vicenda

use crate::record::RecordId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = HashMap<RecordId, Arc<Mutex<()>>>;

#[derive(Debug, Clone, Default)]
pub struct RecordLocks {
    map: Arc<StdMutex<LockMap>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(map: &StdMutex<LockMap>) -> MutexGuard<'_, LockMap> {
        // Nessun codice va in panic tenendo questo lock, il poisoning è innocuo
        map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: RecordId) -> RecordLockGuard {
        let entry = Arc::clone(Self::entries(&self.map).entry(id).or_default());
        let guard = entry.lock_owned().await;

        RecordLockGuard {
            guard: Some(guard),
            map: Arc::clone(&self.map),
        }
    }

    /// Number of records that currently have a lock entry.
    pub fn len(&self) -> usize {
        Self::entries(&self.map).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one record; released on drop.
#[derive(Debug)]
pub struct RecordLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    map: Arc<StdMutex<LockMap>>,
}

impl Drop for RecordLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Entries whose only owner is the map are unused (holders and waiters keep a clone)
        RecordLocks::entries(&self.map).retain(|_, entry| Arc::strong_count(entry) > 1);
    }
}
