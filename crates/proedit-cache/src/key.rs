//! Cache keys.
//!
//! A key names one cached artifact: which kind of resource it is, which file
//! or logical asset it was built from, and the parameters that went into the
//! build. Keys compare and hash structurally and are never mutated once
//! handed to a cache.

use proedit_core::FrameRate;
use smallvec::SmallVec;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extra build parameter of a [`CacheKey::Custom`] key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyParam {
    Int(i64),
    Text(Arc<str>),
    Rate(FrameRate),
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::Rate(rate) => write!(f, "{}/{}", rate.numerator, rate.denominator),
        }
    }
}

impl From<i64> for KeyParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for KeyParam {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<FrameRate> for KeyParam {
    fn from(value: FrameRate) -> Self {
        Self::Rate(value)
    }
}

/// Identifier of a cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A decoded still image.
    Image { path: Arc<Path> },
    /// A run of `container_size` decoded frames starting at
    /// `index * container_size`.
    VideoContainer {
        path: Arc<Path>,
        /// Resolution divisor (1 = full size, 2 = half, ...).
        scale: u32,
        rate: FrameRate,
        container_size: usize,
        index: usize,
    },
    /// A 3D color lookup table.
    Lut { path: Arc<Path> },
    /// A UI icon, addressed by asset name.
    Icon { name: Arc<str> },
    /// Anything else: a class tag, an identity, and free-form parameters.
    Custom {
        class: &'static str,
        identity: Arc<str>,
        params: SmallVec<[KeyParam; 4]>,
    },
}

impl CacheKey {
    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self::Image {
            path: Arc::from(path.into()),
        }
    }

    pub fn video_container(
        path: impl Into<PathBuf>,
        scale: u32,
        rate: FrameRate,
        container_size: usize,
        index: usize,
    ) -> Self {
        Self::VideoContainer {
            path: Arc::from(path.into()),
            scale,
            rate,
            container_size,
            index,
        }
    }

    pub fn lut(path: impl Into<PathBuf>) -> Self {
        Self::Lut {
            path: Arc::from(path.into()),
        }
    }

    pub fn icon(name: &str) -> Self {
        Self::Icon {
            name: Arc::from(name),
        }
    }

    pub fn custom(class: &'static str, identity: &str) -> Self {
        Self::Custom {
            class,
            identity: Arc::from(identity),
            params: SmallVec::new(),
        }
    }

    /// Append a build parameter. Only meaningful for custom keys; the typed
    /// variants already carry all of their parameters, so they are returned
    /// unchanged.
    pub fn with_param(self, param: impl Into<KeyParam>) -> Self {
        match self {
            Self::Custom {
                class,
                identity,
                mut params,
            } => {
                params.push(param.into());
                Self::Custom {
                    class,
                    identity,
                    params,
                }
            }
            other => other,
        }
    }

    /// Resource-class discriminator.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::VideoContainer { .. } => "video-frame-container",
            Self::Lut { .. } => "lut",
            Self::Icon { .. } => "icon",
            Self::Custom { class, .. } => *class,
        }
    }

    /// Source file, for file-backed keys.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Image { path } | Self::VideoContainer { path, .. } | Self::Lut { path } => {
                Some(&**path)
            }
            Self::Icon { .. } | Self::Custom { .. } => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image { path } | Self::Lut { path } => {
                write!(f, "{}:{}", self.class(), path.display())
            }
            Self::VideoContainer {
                path,
                scale,
                rate,
                container_size,
                index,
            } => write!(
                f,
                "{}:{}#{}x{}@{}/{}",
                self.class(),
                path.display(),
                index,
                container_size,
                rate,
                scale
            ),
            Self::Icon { name } => write!(f, "icon:{name}"),
            Self::Custom {
                class,
                identity,
                params,
            } => {
                write!(f, "{class}:{identity}")?;
                for param in params {
                    write!(f, ":{param}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(key: &CacheKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_class_discriminates_same_path() {
        let image = CacheKey::image("/media/a.png");
        let lut = CacheKey::lut("/media/a.png");
        assert_ne!(image, lut);
        assert_eq!(image.path(), lut.path());
    }

    #[test]
    fn test_video_container_params_matter() {
        let a = CacheKey::video_container("/v.mp4", 1, FrameRate::FPS_24, 16, 0);
        let b = CacheKey::video_container("/v.mp4", 2, FrameRate::FPS_24, 16, 0);
        let c = CacheKey::video_container("/v.mp4", 1, FrameRate::FPS_25, 16, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, CacheKey::video_container("/v.mp4", 1, FrameRate::FPS_24, 16, 0));
    }

    #[test]
    fn test_with_param_ignored_for_typed_keys() {
        let key = CacheKey::icon("play").with_param(3i64);
        assert_eq!(key, CacheKey::icon("play"));
    }

    #[test]
    fn test_display_includes_params() {
        let key = CacheKey::custom("thumbnail", "clip-7")
            .with_param(128i64)
            .with_param("jpeg");
        assert_eq!(key.to_string(), "thumbnail:clip-7:128:jpeg");
    }

    proptest! {
        #[test]
        fn prop_equal_components_give_equal_keys(
            identity in "[a-z]{1,12}",
            a in any::<i64>(),
            b in any::<i64>(),
        ) {
            let k1 = CacheKey::custom("sample", &identity).with_param(a).with_param(b);
            let k2 = CacheKey::custom("sample", &identity).with_param(a).with_param(b);
            prop_assert_eq!(&k1, &k2);
            prop_assert_eq!(hash_of(&k1), hash_of(&k2));
        }

        #[test]
        fn prop_param_order_matters(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let k1 = CacheKey::custom("sample", "x").with_param(a).with_param(b);
            let k2 = CacheKey::custom("sample", "x").with_param(b).with_param(a);
            prop_assert_ne!(k1, k2);
        }
    }
}
