//! Cache configuration.
//!
//! Loaded from the `cache` section of the editor settings (JSON). Every field
//! has a default, so an empty object is a valid configuration.

use crate::error::{CacheError, CacheResult};
use proedit_core::cache_defaults;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Floor applied to every entry timeout during sweeps.
    pub min_timeout_ms: u64,
    /// Timeout for callers that pass none.
    pub default_timeout_ms: u64,
    /// Name prefix of background build threads.
    pub worker_name_prefix: String,
    /// Frames decoded per video container.
    pub frames_per_container: usize,
    /// Playback speeds with a smaller magnitude count as paused.
    pub prefetch_dead_zone: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_timeout_ms: cache_defaults::MIN_TIMEOUT_MS,
            default_timeout_ms: cache_defaults::DEFAULT_TIMEOUT_MS,
            worker_name_prefix: "cache-worker".into(),
            frames_per_container: cache_defaults::FRAMES_PER_CONTAINER,
            prefetch_dead_zone: cache_defaults::PREFETCH_DEAD_ZONE,
        }
    }
}

impl CacheConfig {
    pub fn from_json_str(json: &str) -> CacheResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> CacheResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.frames_per_container == 0 {
            return Err(CacheError::InvalidConfig(
                "frames_per_container must be at least 1".into(),
            ));
        }
        if !self.prefetch_dead_zone.is_finite() || self.prefetch_dead_zone < 0.0 {
            return Err(CacheError::InvalidConfig(format!(
                "prefetch_dead_zone must be a non-negative number, got {}",
                self.prefetch_dead_zone
            )));
        }
        if self.worker_name_prefix.is_empty() {
            return Err(CacheError::InvalidConfig(
                "worker_name_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn min_timeout(&self) -> Duration {
        Duration::from_millis(self.min_timeout_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout_ms = u64::try_from(min_timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_frames_per_container(mut self, frames: usize) -> Self {
        self.frames_per_container = frames;
        self
    }

    pub fn with_worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_name_prefix = prefix.into();
        self
    }
}
