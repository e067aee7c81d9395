//! Video frame access through the container cache.

use crate::container::FrameContainer;
use crate::source::{FrameCountRegistry, FrameSource};
use proedit_cache::{
    CacheConfig, CacheKey, ContainerLoader, ContainerSource, LogicalClock, PlaybackDirection,
    ResourceCache, SequentialPrefetcher,
};
use proedit_core::{ProEditError, SharedFrameBuffer};
use std::sync::Arc;
use std::time::Duration;

/// One source viewed at one scale, split into cacheable containers.
pub struct VideoStream<S> {
    source: Arc<S>,
    scale: u32,
    container_size: usize,
    timeout: Duration,
    counts: Arc<FrameCountRegistry>,
}

impl<S> Clone for VideoStream<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            scale: self.scale,
            container_size: self.container_size,
            timeout: self.timeout,
            counts: Arc::clone(&self.counts),
        }
    }
}

impl<S: FrameSource> VideoStream<S> {
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<S: FrameSource> ContainerSource for VideoStream<S> {
    type Container = FrameContainer;
    type Error = ProEditError;

    fn container_key(&self, index: usize) -> CacheKey {
        CacheKey::video_container(
            self.source.path(),
            self.scale,
            self.source.frame_rate(),
            self.container_size,
            index,
        )
    }

    fn container_size(&self) -> usize {
        self.container_size
    }

    fn frame_count(&self) -> Option<usize> {
        self.source
            .frame_count()
            .or_else(|| self.counts.get(self.source.path()))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn loader(&self, index: usize) -> ContainerLoader<FrameContainer, ProEditError> {
        let source = Arc::clone(&self.source);
        let counts = Arc::clone(&self.counts);
        let (size, scale) = (self.container_size, self.scale);

        Box::new(move || {
            let start = index * size;
            let frames = source.decode(start, size, scale)?;
            // An empty run only says the stream ends somewhere before `start`.
            if frames.is_empty() {
                return Err(ProEditError::NotFound(format!(
                    "no frames at {start} in {}",
                    source.path().display()
                )));
            }
            if frames.len() < size {
                counts.record(source.path(), start + frames.len());
            }
            Ok(FrameContainer::new(start, frames))
        })
    }
}

/// The "Videos" cache section.
pub struct VideoFrameCache {
    prefetcher: SequentialPrefetcher<FrameContainer>,
    counts: Arc<FrameCountRegistry>,
}

impl VideoFrameCache {
    pub const SECTION: &'static str = "Videos";

    pub fn new(config: CacheConfig, clock: LogicalClock) -> Self {
        let cache = ResourceCache::new(Self::SECTION, config, clock);
        Self {
            prefetcher: SequentialPrefetcher::new(cache),
            counts: Arc::new(FrameCountRegistry::new()),
        }
    }

    pub fn cache(&self) -> &ResourceCache<FrameContainer> {
        self.prefetcher.cache()
    }

    pub fn frame_counts(&self) -> &FrameCountRegistry {
        &self.counts
    }

    /// View `source` at `scale` (1 = full resolution) with the configured
    /// container size and default timeout.
    pub fn stream<S: FrameSource>(&self, source: Arc<S>, scale: u32) -> VideoStream<S> {
        let config = self.cache().config();
        VideoStream {
            source,
            scale: scale.max(1),
            container_size: config.frames_per_container,
            timeout: config.default_timeout(),
            counts: Arc::clone(&self.counts),
        }
    }

    /// Non-blocking frame access for playback. `speed` is the signed
    /// playback speed; it selects which neighbour container to prefetch.
    pub fn get_frame<S: FrameSource>(
        &self,
        stream: &VideoStream<S>,
        frame_index: i64,
        speed: f64,
        looping: bool,
    ) -> Option<SharedFrameBuffer> {
        let direction =
            PlaybackDirection::from_speed(speed, self.cache().config().prefetch_dead_zone);
        self.prefetcher
            .get_frame(stream, frame_index, direction, looping)
    }

    /// Blocking frame access for thumbnails and export.
    pub fn get_frame_sync<S: FrameSource>(
        &self,
        stream: &VideoStream<S>,
        frame_index: i64,
    ) -> Option<SharedFrameBuffer> {
        self.prefetcher.get_frame_sync(stream, frame_index)
    }
}
