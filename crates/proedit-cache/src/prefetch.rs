//! Sequential prefetch for ordered media.
//!
//! Video is cached in containers: fixed-size runs of consecutive decoded
//! frames. [`SequentialPrefetcher::get_frame`] serves a frame from its
//! container without blocking and, once that container has been current for
//! at least one tick, speculatively requests its neighbour in the playback
//! direction so the decode overlaps with playback.

use crate::cache::{FetchMode, ResourceCache};
use crate::key::CacheKey;
use crate::resource::Resource;
use std::fmt;
use std::time::Duration;
use tracing::trace;

/// Which way the playhead is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackDirection {
    Forward,
    Backward,
    Paused,
}

impl PlaybackDirection {
    /// Classify a signed playback speed. Speeds within `dead_zone` of zero
    /// count as paused.
    pub fn from_speed(speed: f64, dead_zone: f64) -> Self {
        if speed > dead_zone {
            Self::Forward
        } else if speed < -dead_zone {
            Self::Backward
        } else {
            Self::Paused
        }
    }
}

/// A cached resource holding a contiguous run of frames.
pub trait FrameSequence: Resource {
    type Frame: Clone;

    /// Frame at `offset` within this container, if it was decoded.
    fn frame(&self, offset: usize) -> Option<Self::Frame>;

    fn frame_len(&self) -> usize;
}

/// Boxed container generator handed to the cache.
pub type ContainerLoader<C, E> = Box<dyn FnOnce() -> Result<C, E> + Send>;

/// One ordered media stream, split into containers.
pub trait ContainerSource {
    type Container: FrameSequence;
    type Error: fmt::Display + 'static;

    /// Key of the container at `index`. Must differ per index.
    fn container_key(&self, index: usize) -> CacheKey;

    /// Frames per container; at least 1.
    fn container_size(&self) -> usize;

    /// Total frames in the stream, if known.
    fn frame_count(&self) -> Option<usize>;

    /// Idle timeout for cached containers.
    fn timeout(&self) -> Duration;

    fn loader(&self, index: usize) -> ContainerLoader<Self::Container, Self::Error>;
}

/// Container to request speculatively after serving container `index`.
///
/// Forward playback asks for the next container if it exists (an unknown
/// frame count counts as existing) and wraps to container 0 when looping.
/// Backward playback asks for the previous container and, when looping and
/// the frame count is known, wraps to the last one.
pub fn prefetch_target(
    index: usize,
    container_size: usize,
    frame_count: Option<usize>,
    direction: PlaybackDirection,
    looping: bool,
) -> Option<usize> {
    let container_size = container_size.max(1);
    let target = match direction {
        PlaybackDirection::Paused => None,
        PlaybackDirection::Forward => {
            let next = index + 1;
            let exists = frame_count.map_or(true, |n| next * container_size < n);
            if exists {
                Some(next)
            } else if looping {
                Some(0)
            } else {
                None
            }
        }
        PlaybackDirection::Backward => {
            if index > 0 {
                Some(index - 1)
            } else if looping {
                frame_count
                    .filter(|&n| n > 0)
                    .map(|n| (n - 1) / container_size)
            } else {
                None
            }
        }
    };
    // Single-container media would otherwise prefetch itself.
    target.filter(|&t| t != index)
}

/// Frame access with neighbour prefetch on top of a container cache.
#[derive(Debug)]
pub struct SequentialPrefetcher<C: FrameSequence> {
    cache: ResourceCache<C>,
}

impl<C: FrameSequence> Clone for SequentialPrefetcher<C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<C: FrameSequence> SequentialPrefetcher<C> {
    pub fn new(cache: ResourceCache<C>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ResourceCache<C> {
        &self.cache
    }

    /// Frame `frame_index` of `source`, or `None` if its container is not
    /// decoded yet, failed, or the index is out of range. Never blocks.
    pub fn get_frame<S>(
        &self,
        source: &S,
        frame_index: i64,
        direction: PlaybackDirection,
        looping: bool,
    ) -> Option<C::Frame>
    where
        S: ContainerSource<Container = C>,
    {
        let frame_index = usize::try_from(frame_index).ok()?;
        let size = source.container_size().max(1);
        let index = frame_index / size;

        let entry = self.cache.get_entry(
            source.container_key(index),
            source.timeout(),
            FetchMode::Async,
            source.loader(index),
        )?;
        let container = entry.resource()?;

        // Only once the container has survived a tick; the first tick after a
        // build is usually spent uploading it.
        if entry.created_at() != self.cache.clock().now() {
            if let Some(target) =
                prefetch_target(index, size, source.frame_count(), direction, looping)
            {
                self.prefetch(source, target);
            }
        }

        container.frame(frame_index % size)
    }

    /// Blocking frame access for exports and thumbnails. No prefetch.
    pub fn get_frame_sync<S>(&self, source: &S, frame_index: i64) -> Option<C::Frame>
    where
        S: ContainerSource<Container = C>,
    {
        let frame_index = usize::try_from(frame_index).ok()?;
        let size = source.container_size().max(1);
        let index = frame_index / size;
        let container = self.cache.get(
            source.container_key(index),
            source.timeout(),
            FetchMode::Sync,
            source.loader(index),
        )?;
        container.frame(frame_index % size)
    }

    fn prefetch<S>(&self, source: &S, index: usize)
    where
        S: ContainerSource<Container = C>,
    {
        let key = source.container_key(index);
        if self.cache.contains(&key) || self.cache.is_building(&key) {
            return;
        }
        trace!(cache = self.cache.name(), key = %key, "Prefetching container");
        self.cache
            .get(key, source.timeout(), FetchMode::Async, source.loader(index));
    }
}
