//! ProEdit Cache - shared cache for expensive editor resources
//!
//! This crate provides:
//! - `ResourceCache`: builds each key at most once, with non-blocking (async)
//!   and blocking (sync) fetch modes
//! - Time-based eviction driven by the render loop (`CacheSet::tick`)
//! - Sequential prefetch of video frame containers
//! - Deferred destruction for thread-affine resources

pub mod cache;
pub mod clock;
pub mod config;
pub mod destroy_queue;
pub mod entry;
pub mod error;
pub mod key;
pub mod lock_table;
pub mod prefetch;
pub mod resource;
pub mod stats;
pub mod store;
pub mod sweeper;

pub use cache::{EntryState, FetchMode, ResourceCache};
pub use clock::LogicalClock;
pub use config::CacheConfig;
pub use destroy_queue::{Deferred, DestroyHandle, DestroyQueue};
pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, KeyParam};
pub use prefetch::{
    prefetch_target, ContainerLoader, ContainerSource, FrameSequence, PlaybackDirection,
    SequentialPrefetcher,
};
pub use resource::{DestroyFlag, Resource};
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use sweeper::{CacheSet, Sweepable};
