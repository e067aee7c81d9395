//! Still images, decoded with the `image` crate.

use proedit_cache::{CacheConfig, CacheKey, DestroyFlag, FetchMode, LogicalClock, Resource, ResourceCache};
use proedit_core::{FrameBuffer, PixelFormat, ProEditError, Result, SharedFrameBuffer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// A decoded RGBA image.
#[derive(Debug)]
pub struct ImageResource {
    buffer: SharedFrameBuffer,
    destroyed: DestroyFlag,
}

impl ImageResource {
    pub fn new(buffer: SharedFrameBuffer) -> Self {
        Self {
            buffer,
            destroyed: DestroyFlag::new(),
        }
    }

    pub fn buffer(&self) -> &SharedFrameBuffer {
        &self.buffer
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.buffer.width, self.buffer.height)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_destroyed()
    }
}

impl Resource for ImageResource {
    fn destroy(&self) -> Result<()> {
        if self.destroyed.mark() {
            trace!(width = self.buffer.width, height = self.buffer.height, "Image released");
        }
        Ok(())
    }

    fn memory_size(&self) -> usize {
        self.buffer.memory_size()
    }
}

/// Decode any format the `image` crate understands into RGBA8.
pub fn decode_image(path: &Path) -> Result<FrameBuffer> {
    let decoded = ::image::open(path)
        .map_err(|e| ProEditError::Image(format!("{}: {e}", path.display())))?
        .to_rgba8();
    FrameBuffer::from_packed(
        decoded.width(),
        decoded.height(),
        PixelFormat::Rgba8,
        decoded.as_raw(),
    )
}

/// The "Images" cache section.
#[derive(Clone)]
pub struct ImageCache {
    cache: ResourceCache<ImageResource>,
}

impl ImageCache {
    pub const SECTION: &'static str = "Images";

    pub fn new(config: CacheConfig, clock: LogicalClock) -> Self {
        Self {
            cache: ResourceCache::new(Self::SECTION, config, clock),
        }
    }

    pub fn cache(&self) -> &ResourceCache<ImageResource> {
        &self.cache
    }

    /// Image at `path`. Missing files and directories yield `None` without
    /// touching the cache; undecodable files are cached as failures.
    pub fn get_image(
        &self,
        path: &Path,
        timeout: Duration,
        mode: FetchMode,
    ) -> Option<Arc<ImageResource>> {
        let owned = path.to_path_buf();
        self.cache.get_file(path, false, CacheKey::image(path), timeout, mode, move || {
            decode_image(&owned).map(|buffer| ImageResource::new(Arc::new(buffer)))
        })
    }
}
