//! Eviction of idle entries across every cache section.
//!
//! Sections register with a [`CacheSet`]; the render loop calls
//! [`CacheSet::tick`] once per frame, which advances the shared clock and
//! sweeps each section. Destroy hooks therefore run on the ticking thread.

use crate::cache::ResourceCache;
use crate::clock::LogicalClock;
use crate::entry::CacheEntry;
use crate::key::CacheKey;
use crate::resource::Resource;
use crate::stats::CacheStats;
use parking_lot::RwLock;
use proedit_core::LogicalTime;
use std::sync::Arc;
use tracing::{debug, info};

/// Destroy entries already removed from a store and count them as evictions.
pub(crate) fn destroy_entries<R: Resource>(
    cache: &str,
    entries: Vec<(CacheKey, CacheEntry<R>)>,
    stats: &CacheStats,
) -> usize {
    let count = entries.len();
    for (key, entry) in entries {
        let clean = entry.destroy(cache, &key);
        stats.record_eviction(clean);
    }
    count
}

/// A cache section the sweeper can drive without knowing its resource type.
pub trait Sweepable: Send + Sync {
    fn name(&self) -> &str;

    /// Evict entries idle at `now`; returns how many were evicted.
    fn sweep(&self, now: LogicalTime) -> usize;

    /// Destroy everything; returns how many entries were dropped.
    fn clear(&self) -> usize;

    fn entry_count(&self) -> usize;
}

impl<R: Resource> Sweepable for ResourceCache<R> {
    fn name(&self) -> &str {
        ResourceCache::name(self)
    }

    fn sweep(&self, now: LogicalTime) -> usize {
        ResourceCache::sweep(self, now)
    }

    fn clear(&self) -> usize {
        ResourceCache::clear(self)
    }

    fn entry_count(&self) -> usize {
        self.len()
    }
}

/// All cache sections of one editor instance, sharing one clock.
pub struct CacheSet {
    clock: LogicalClock,
    sections: RwLock<Vec<Arc<dyn Sweepable>>>,
}

impl CacheSet {
    pub fn new(clock: LogicalClock) -> Self {
        Self {
            clock,
            sections: RwLock::new(Vec::new()),
        }
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn register(&self, section: Arc<dyn Sweepable>) {
        debug!(section = section.name(), "Cache section registered");
        self.sections.write().push(section);
    }

    /// Advance the clock to `now` and sweep every section.
    ///
    /// Returns the total number of evicted entries.
    pub fn tick(&self, now: LogicalTime) -> usize {
        let now = self.clock.advance_to(now);
        // Snapshot so a section's destroy hook may register another section.
        let sections = self.sections.read().clone();
        sections.iter().map(|section| section.sweep(now)).sum()
    }

    /// Destroy the contents of every section, e.g. when a project is closed.
    pub fn clear_all(&self) -> usize {
        let sections = self.sections.read().clone();
        let cleared: usize = sections.iter().map(|section| section.clear()).sum();
        info!(sections = sections.len(), cleared, "All cache sections cleared");
        cleared
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections
            .read()
            .iter()
            .map(|section| section.name().to_string())
            .collect()
    }

    pub fn total_entries(&self) -> usize {
        self.sections.read().iter().map(|s| s.entry_count()).sum()
    }
}
