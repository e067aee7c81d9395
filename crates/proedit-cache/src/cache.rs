//! The construction orchestrator.
//!
//! [`ResourceCache::get`] guarantees that a key is built at most once at a
//! time, no matter how async and sync callers interleave:
//!
//! 1. A store hit returns immediately.
//! 2. Otherwise the caller claims the key in the [`LockTable`]. Async callers
//!    give up (`None`) if someone else holds the claim; sync callers wait.
//! 3. With the claim held the store is checked again, since another builder
//!    may have finished in the meantime.
//! 4. On a genuine miss the generator runs (on a worker thread for async
//!    callers, inline for sync ones), the result is inserted, and the claim
//!    is released.
//!
//! Generator errors and panics are logged and cached as a failed entry, so
//! a broken asset is retried only after the sweeper drops it.

use crate::clock::LogicalClock;
use crate::config::CacheConfig;
use crate::entry::{panic_message, CacheEntry};
use crate::key::CacheKey;
use crate::lock_table::{Claim, LockTable};
use crate::resource::Resource;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::store::CacheStore;
use crate::sweeper;
use proedit_core::LogicalTime;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// How a caller is willing to wait for a cold key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Never block: start a background build if needed and return `None`
    /// until it has finished.
    Async,
    /// Block until the key is built, by this thread or another one.
    Sync,
}

/// What the cache currently knows about a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Not stored and not being built.
    Cold,
    /// A builder holds the claim and nothing is stored yet.
    Building,
    Ready,
    /// The last build failed; the failure stays cached until evicted.
    Failed,
}

struct Shared<R> {
    name: String,
    config: CacheConfig,
    clock: LogicalClock,
    store: CacheStore<R>,
    locks: Arc<LockTable>,
    stats: CacheStats,
}

/// A named cache section holding one kind of resource.
///
/// Cloning is cheap and every clone refers to the same storage, so the
/// cache can be handed to every subsystem that needs it.
pub struct ResourceCache<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for ResourceCache<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Resource> fmt::Debug for ResourceCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("name", &self.shared.name)
            .field("entries", &self.shared.store.len())
            .field("building", &self.shared.locks.len())
            .finish()
    }
}

impl<R: Resource> ResourceCache<R> {
    pub fn new(name: impl Into<String>, config: CacheConfig, clock: LogicalClock) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                clock,
                store: CacheStore::new(),
                locks: Arc::new(LockTable::new()),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.shared.clock
    }

    // ── Construction ───────────────────────────────────────────────

    /// Fetch `key`, building it with `generator` on a miss.
    ///
    /// `timeout` is how long the entry may sit unused before a sweep evicts
    /// it; it does not bound the build. Returns `None` when the resource is
    /// not ready yet (async mode) or its build failed.
    ///
    /// `generator` runs on an arbitrary thread and must not request the same
    /// key from this cache.
    pub fn get<F, E>(
        &self,
        key: CacheKey,
        timeout: Duration,
        mode: FetchMode,
        generator: F,
    ) -> Option<Arc<R>>
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        E: fmt::Display,
    {
        self.get_entry(key, timeout, mode, generator)
            .and_then(CacheEntry::into_resource)
    }

    /// Like [`get`](Self::get) but returns the whole entry, including cached
    /// failures and the time the entry was created.
    pub fn get_entry<F, E>(
        &self,
        key: CacheKey,
        timeout: Duration,
        mode: FetchMode,
        generator: F,
    ) -> Option<CacheEntry<R>>
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        E: fmt::Display,
    {
        let shared = &self.shared;

        if let Some(entry) = shared.store.lookup(&key, shared.clock.now()) {
            shared.stats.record_hit();
            return Some(entry);
        }

        let claim = match mode {
            FetchMode::Async => match shared.locks.try_claim(&key) {
                Some(claim) => claim,
                None => {
                    shared.stats.record_not_ready();
                    trace!(cache = %shared.name, key = %key, "Build in flight, not ready");
                    return None;
                }
            },
            FetchMode::Sync => {
                let (claim, waited) = shared.locks.claim_blocking(&key);
                if waited {
                    trace!(cache = %shared.name, key = %key, "Waited for concurrent build");
                }
                claim
            }
        };

        // Another builder may have finished between the first lookup and the claim.
        if let Some(entry) = shared.store.lookup(&key, shared.clock.now()) {
            shared.stats.record_hit();
            return Some(entry);
        }
        shared.stats.record_miss();

        match mode {
            FetchMode::Sync => Some(shared.build(claim, generator, timeout)),
            FetchMode::Async => {
                let worker = Arc::clone(shared);
                let spawned = thread::Builder::new()
                    .name(format!("{}-{}", shared.config.worker_name_prefix, shared.name))
                    .spawn(move || {
                        worker.build(claim, generator, timeout);
                    });
                if let Err(e) = spawned {
                    // The closure, and with it the claim, is dropped here.
                    warn!(cache = %shared.name, key = %key, error = %e, "Failed to spawn build worker");
                }
                None
            }
        }
    }

    /// File-backed [`get`](Self::get): returns `None` without consulting the
    /// cache when `path` does not exist, or is a directory and
    /// `allow_directories` is false.
    pub fn get_file<F, E>(
        &self,
        path: &Path,
        allow_directories: bool,
        key: CacheKey,
        timeout: Duration,
        mode: FetchMode,
        generator: F,
    ) -> Option<Arc<R>>
    where
        F: FnOnce() -> Result<R, E> + Send + 'static,
        E: fmt::Display,
    {
        let metadata = std::fs::metadata(path).ok()?;
        if metadata.is_dir() && !allow_directories {
            return None;
        }
        self.get(key, timeout, mode, generator)
    }

    // ── Direct store access ────────────────────────────────────────

    /// Store lookup that refreshes the entry but never builds.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheEntry<R>> {
        let entry = self.shared.store.lookup(key, self.shared.clock.now());
        if entry.is_some() {
            self.shared.stats.record_hit();
        }
        entry
    }

    /// Insert a resource (or a failure, for `None`) built outside the cache.
    ///
    /// An entry already stored under `key` is destroyed.
    pub fn insert(&self, key: CacheKey, resource: Option<R>, timeout: Duration) {
        let entry = CacheEntry::new(resource.map(Arc::new), timeout, self.shared.clock.now());
        self.shared.insert(key, entry);
    }

    /// Remove an entry without destroying it; the caller takes over the
    /// destroy obligation.
    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry<R>> {
        self.shared.store.remove(key)
    }

    /// Remove and destroy one entry. Returns whether anything was stored.
    pub fn evict(&self, key: &CacheKey) -> bool {
        match self.shared.store.remove(key) {
            Some(entry) => {
                let clean = entry.destroy(&self.shared.name, key);
                self.shared.stats.record_eviction(clean);
                true
            }
            None => false,
        }
    }

    // ── Eviction ───────────────────────────────────────────────────

    /// Evict and destroy every entry idle for longer than
    /// `max(timeout, min_timeout)` at `now`. Returns the number evicted.
    pub fn sweep(&self, now: LogicalTime) -> usize {
        let shared = &self.shared;
        let expired = shared.store.take_expired(now, shared.config.min_timeout());
        if expired.is_empty() {
            return 0;
        }
        let evicted = sweeper::destroy_entries(&shared.name, expired, &shared.stats);
        debug!(cache = %shared.name, evicted, now = %now, "Sweep evicted idle entries");
        evicted
    }

    /// Destroy every stored entry. Builds in flight keep their claims and
    /// insert normally when they finish.
    pub fn clear(&self) -> usize {
        let shared = &self.shared;
        let entries = shared.store.drain();
        let cleared = sweeper::destroy_entries(&shared.name, entries, &shared.stats);
        if cleared > 0 {
            info!(cache = %shared.name, cleared, "Cache cleared");
        }
        cleared
    }

    // ── Introspection ──────────────────────────────────────────────

    pub fn state(&self, key: &CacheKey) -> EntryState {
        match self.shared.store.peek(key) {
            Some(entry) if entry.is_failed() => EntryState::Failed,
            Some(_) => EntryState::Ready,
            None if self.shared.locks.is_claimed(key) => EntryState::Building,
            None => EntryState::Cold,
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.shared.store.contains(key)
    }

    pub fn is_building(&self, key: &CacheKey) -> bool {
        self.shared.locks.is_claimed(key)
    }

    /// Number of keys currently being built.
    pub fn building_count(&self) -> usize {
        self.shared.locks.len()
    }

    pub fn len(&self) -> usize {
        self.shared.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.shared.store.keys()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl<R: Resource> Shared<R> {
    /// Run `generator` under `claim`, store the outcome and release the claim.
    fn build<F, E>(&self, claim: Claim, generator: F, timeout: Duration) -> CacheEntry<R>
    where
        F: FnOnce() -> Result<R, E>,
        E: fmt::Display,
    {
        let key = claim.key().clone();
        let started = Instant::now();

        let resource = match panic::catch_unwind(AssertUnwindSafe(generator)) {
            Ok(Ok(resource)) => {
                debug!(
                    cache = %self.name,
                    key = %key,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    bytes = resource.memory_size(),
                    "Resource built"
                );
                Some(Arc::new(resource))
            }
            Ok(Err(e)) => {
                warn!(cache = %self.name, key = %key, error = %e, "Resource build failed");
                None
            }
            Err(payload) => {
                warn!(
                    cache = %self.name,
                    key = %key,
                    panic = panic_message(payload.as_ref()),
                    "Resource generator panicked"
                );
                None
            }
        };
        self.stats.record_build(resource.is_some());

        let entry = CacheEntry::new(resource, timeout, self.clock.now());
        self.insert(key, entry.clone());
        drop(claim);
        entry
    }

    fn insert(&self, key: CacheKey, entry: CacheEntry<R>) {
        if let Some(displaced) = self.store.insert(key.clone(), entry) {
            let clean = displaced.destroy(&self.name, &key);
            self.stats.record_eviction(clean);
        }
    }
}
