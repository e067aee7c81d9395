//! The key → entry map.
//!
//! Every operation takes the single store mutex for a short, bounded time.
//! Nothing here builds or destroys a resource: removed entries are handed
//! back to the caller, who destroys them after the lock is released.

use crate::entry::CacheEntry;
use crate::key::CacheKey;
use crate::resource::Resource;
use parking_lot::Mutex;
use proedit_core::LogicalTime;
use std::collections::HashMap;
use std::time::Duration;

pub struct CacheStore<R> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<R>>>,
}

impl<R: Resource> Default for CacheStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> CacheStore<R> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up `key`, marking the entry as used at `now` on a hit.
    pub fn lookup(&self, key: &CacheKey, now: LogicalTime) -> Option<CacheEntry<R>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key)?;
        entry.touch(now);
        Some(entry.clone())
    }

    /// Look up `key` without refreshing it.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<R>> {
        self.entries.lock().get(key).cloned()
    }

    /// Insert or overwrite. Returns the displaced entry, if any.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry<R>) -> Option<CacheEntry<R>> {
        self.entries.lock().insert(key, entry)
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry<R>> {
        self.entries.lock().remove(key)
    }

    /// Remove and return every entry idle for longer than
    /// `max(entry.timeout, min_timeout)` at `now`.
    pub fn take_expired(
        &self,
        now: LogicalTime,
        min_timeout: Duration,
    ) -> Vec<(CacheKey, CacheEntry<R>)> {
        let mut entries = self.entries.lock();
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, min_timeout))
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| entries.remove(&key).map(|entry| (key, entry)))
            .collect()
    }

    /// Remove and return every entry.
    pub fn drain(&self) -> Vec<(CacheKey, CacheEntry<R>)> {
        self.entries.lock().drain().collect()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the stored keys, in no particular order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.lock().keys().cloned().collect()
    }
}
