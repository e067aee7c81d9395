//! ProEdit Core - Foundation types shared by the caches and loaders
//!
//! This crate provides:
//! - Error types
//! - Frame buffers and pixel formats
//! - Media time (RationalTime, FrameRate) and the render loop's LogicalTime

pub mod error;
pub mod frame;
pub mod time;

pub use error::{ProEditError, Result};
pub use frame::{FrameBuffer, PixelFormat, SharedFrameBuffer};
pub use time::{FrameRate, LogicalTime, RationalTime};

/// Default timings for cached artifacts.
pub mod cache_defaults {
    /// Floor applied to every entry timeout, in milliseconds.
    pub const MIN_TIMEOUT_MS: u64 = 300;

    /// Timeout used when a caller has no preference, in milliseconds.
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

    /// Consecutive frames decoded into one video container.
    pub const FRAMES_PER_CONTAINER: usize = 16;

    /// Playback speeds within this distance of zero count as paused.
    pub const PREFETCH_DEAD_ZONE: f64 = 0.01;
}
