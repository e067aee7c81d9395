//! UI icons, with a placeholder for anything not loaded.
//!
//! Icons become textures owned by the render thread, so the section stores
//! them as [`Deferred`] resources and their release waits for the next
//! [`DestroyQueue::drain`](proedit_cache::DestroyQueue::drain).

use crate::image::{decode_image, ImageResource};
use proedit_cache::{
    CacheConfig, CacheKey, Deferred, DestroyHandle, FetchMode, LogicalClock, ResourceCache,
};
use proedit_core::{FrameBuffer, PixelFormat, SharedFrameBuffer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 4x4 magenta/black checkerboard drawn in place of missing icons.
pub fn placeholder_texture() -> FrameBuffer {
    let mut buffer = FrameBuffer::new(4, 4, PixelFormat::Rgba8);
    for y in 0..4 {
        let row = buffer.row_mut(y);
        for x in 0..4usize {
            let color = if (x + y as usize) % 2 == 0 {
                [255, 0, 255, 255]
            } else {
                [0, 0, 0, 255]
            };
            row[x * 4..x * 4 + 4].copy_from_slice(&color);
        }
    }
    buffer
}

/// The "Icons" cache section. Icons are looked up by name under `root`.
#[derive(Clone)]
pub struct IconCache {
    cache: ResourceCache<Deferred<ImageResource>>,
    root: PathBuf,
    destroy: DestroyHandle,
    placeholder: SharedFrameBuffer,
    timeout: Duration,
}

impl IconCache {
    pub const SECTION: &'static str = "Icons";

    pub fn new(
        root: impl Into<PathBuf>,
        config: CacheConfig,
        clock: LogicalClock,
        destroy: DestroyHandle,
    ) -> Self {
        let timeout = config.default_timeout();
        Self {
            cache: ResourceCache::new(Self::SECTION, config, clock),
            root: root.into(),
            destroy,
            placeholder: Arc::new(placeholder_texture()),
            timeout,
        }
    }

    pub fn cache(&self) -> &ResourceCache<Deferred<ImageResource>> {
        &self.cache
    }

    pub fn placeholder(&self) -> &SharedFrameBuffer {
        &self.placeholder
    }

    /// Icon `name`, or the placeholder while it loads, when the file does
    /// not exist, or when it failed to decode.
    pub fn get_icon(&self, name: &str, mode: FetchMode) -> SharedFrameBuffer {
        let path = self.root.join(name);
        let placeholder = Arc::clone(&self.placeholder);
        let destroy = self.destroy.clone();
        let label = format!("icon {name}");
        let icon = self.cache.get(CacheKey::icon(name), self.timeout, mode, move || {
            let image = if path.is_file() {
                ImageResource::new(Arc::new(decode_image(&path)?))
            } else {
                debug!(path = %path.display(), "Icon missing, using placeholder");
                ImageResource::new(placeholder)
            };
            Ok::<_, proedit_core::ProEditError>(Deferred::new(image, label, destroy))
        });
        match icon {
            Some(icon) => Arc::clone(icon.buffer()),
            None => Arc::clone(&self.placeholder),
        }
    }
}
