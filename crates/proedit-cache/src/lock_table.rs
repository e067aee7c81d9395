//! Keys currently under construction.
//!
//! Holding a [`Claim`] is the only way to build a key, and the table hands
//! out at most one claim per key at a time. Claims release themselves on
//! drop, so a builder that panics cannot leave its key locked.

use crate::key::CacheKey;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Default)]
pub struct LockTable {
    keys: Mutex<HashSet<CacheKey>>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` if nobody else is building it.
    pub fn try_claim(self: &Arc<Self>, key: &CacheKey) -> Option<Claim> {
        let mut keys = self.keys.lock();
        if keys.insert(key.clone()) {
            Some(Claim::new(self, key))
        } else {
            None
        }
    }

    /// Claim `key`, blocking the calling thread while another builder holds it.
    ///
    /// Returns the claim and whether the call had to wait.
    pub fn claim_blocking(self: &Arc<Self>, key: &CacheKey) -> (Claim, bool) {
        let mut keys = self.keys.lock();
        let mut waited = false;
        while keys.contains(key) {
            waited = true;
            self.released.wait(&mut keys);
        }
        keys.insert(key.clone());
        (Claim::new(self, key), waited)
    }

    pub fn is_claimed(&self, key: &CacheKey) -> bool {
        self.keys.lock().contains(key)
    }

    /// Number of keys being built right now.
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    fn release(&self, key: &CacheKey) {
        let removed = self.keys.lock().remove(key);
        debug_assert!(removed, "released a key that was not claimed");
        self.released.notify_all();
    }
}

/// Exclusive right to build one key.
pub struct Claim {
    table: Arc<LockTable>,
    key: CacheKey,
}

impl Claim {
    fn new(table: &Arc<LockTable>, key: &CacheKey) -> Self {
        Self {
            table: Arc::clone(table),
            key: key.clone(),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}

impl std::fmt::Debug for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Claim").field(&self.key).finish()
    }
}
