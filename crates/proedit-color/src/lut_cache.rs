//! The "LUTs" cache section.

use crate::error::ColorError;
use crate::lut::Lut3D;
use proedit_cache::{CacheConfig, CacheKey, DestroyFlag, FetchMode, LogicalClock, Resource, ResourceCache};
use proedit_core::{FrameBuffer, PixelFormat};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// A parsed LUT held by the cache.
#[derive(Debug)]
pub struct LutResource {
    lut: Lut3D,
    destroyed: DestroyFlag,
}

impl LutResource {
    pub fn new(lut: Lut3D) -> Self {
        Self {
            lut,
            destroyed: DestroyFlag::new(),
        }
    }

    pub fn lut(&self) -> &Lut3D {
        &self.lut
    }
}

impl Resource for LutResource {
    fn destroy(&self) -> proedit_core::Result<()> {
        if self.destroyed.mark() {
            trace!(size = self.lut.size, "LUT released");
        }
        Ok(())
    }

    fn memory_size(&self) -> usize {
        self.lut.memory_size()
    }
}

/// Load a LUT from a `.cube` file, or from a strip image otherwise.
pub fn load_lut(path: &Path) -> Result<Lut3D, ColorError> {
    let is_cube = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("cube"));

    let lut = if is_cube {
        Lut3D::from_cube(&std::fs::read_to_string(path)?)?
    } else {
        let decoded = image::open(path)
            .map_err(|e| ColorError::Image(format!("{}: {e}", path.display())))?
            .to_rgba8();
        let strip = FrameBuffer::from_packed(
            decoded.width(),
            decoded.height(),
            PixelFormat::Rgba8,
            decoded.as_raw(),
        )
        .map_err(|e| ColorError::Image(e.to_string()))?;
        Lut3D::from_strip(&strip)?
    };
    debug!(path = %path.display(), size = lut.size, "LUT loaded");
    Ok(lut)
}

#[derive(Clone)]
pub struct LutCache {
    cache: ResourceCache<LutResource>,
}

impl LutCache {
    pub const SECTION: &'static str = "LUTs";

    pub fn new(config: CacheConfig, clock: LogicalClock) -> Self {
        Self {
            cache: ResourceCache::new(Self::SECTION, config, clock),
        }
    }

    pub fn cache(&self) -> &ResourceCache<LutResource> {
        &self.cache
    }

    /// LUT at `path`; `None` while loading, for missing files, and for
    /// files that failed to parse.
    pub fn get_lut(&self, path: &Path, timeout: Duration, mode: FetchMode) -> Option<Arc<LutResource>> {
        let owned = path.to_path_buf();
        self.cache.get_file(path, false, CacheKey::lut(path), timeout, mode, move || {
            load_lut(&owned).map(LutResource::new)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proedit_cache::EntryState;

    const IDENTITY_2: &str = "TITLE \"identity\"\nLUT_3D_SIZE 2\n\
        0 0 0\n1 0 0\n0 1 0\n1 1 0\n0 0 1\n1 0 1\n0 1 1\n1 1 1\n";

    fn luts() -> LutCache {
        LutCache::new(CacheConfig::default(), LogicalClock::new())
    }

    #[test]
    fn test_cube_file_through_cache() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("identity.CUBE");
        std::fs::write(&path, IDENTITY_2).unwrap();
        let luts = luts();

        let lut = luts.get_lut(&path, Duration::from_secs(5), FetchMode::Sync).unwrap();
        assert_eq!(lut.lut().size, 2);
        assert_eq!(luts.cache().state(&CacheKey::lut(&path)), EntryState::Ready);
    }

    #[test]
    fn test_strip_image_file() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("warm.png");
        // 4 tiles of 2x2: width 4, height 2.
        image::RgbaImage::from_fn(4, 2, |x, y| {
            image::Rgba([(x % 2 * 255) as u8, (y * 255) as u8, (x / 2 * 255) as u8, 255])
        })
        .save(&path)
        .unwrap();

        let lut = load_lut(&path).unwrap();
        assert_eq!(lut.size, 2);
        let out = lut.apply([1.0, 0.0, 1.0]);
        assert!((out[0] - 1.0).abs() < 1e-6 && out[1].abs() < 1e-6 && (out[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bad_cube_is_cached_failure() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("broken.cube");
        std::fs::write(&path, "LUT_3D_SIZE 4\n0 0 0\n").unwrap();
        let luts = luts();

        assert!(luts.get_lut(&path, Duration::from_secs(5), FetchMode::Sync).is_none());
        assert_eq!(luts.cache().state(&CacheKey::lut(&path)), EntryState::Failed);
    }

    #[test]
    fn test_missing_file_skips_cache() {
        let luts = luts();
        let path = Path::new("/no/such/grade.cube");
        assert!(luts.get_lut(path, Duration::from_secs(5), FetchMode::Sync).is_none());
        assert!(luts.cache().is_empty());
    }
}
