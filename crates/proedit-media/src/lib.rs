//! ProEdit Media - cached media loaders
//!
//! This crate handles:
//! - Video frame sources (FFmpeg via ffmpeg-sidecar, synthetic test patterns)
//! - Video frame containers and the prefetching `VideoFrameCache`
//! - Still images and UI icons

pub mod container;
pub mod icon;
pub mod image;
pub mod source;
pub mod video;

pub use container::FrameContainer;
pub use icon::IconCache;
pub use crate::image::{decode_image, ImageCache, ImageResource};
pub use source::{FfmpegSource, FrameCountRegistry, FrameSource, SyntheticSource};
pub use video::{VideoFrameCache, VideoStream};

/// Log FFmpeg availability once at startup.
pub fn init() {
    let available = ffmpeg_sidecar::command::ffmpeg_is_installed();
    tracing::info!(ffmpeg = available, "ProEdit Media initialized");
}
