//! Frame sources: where decoded video frames come from.
//!
//! [`FfmpegSource`] spawns FFmpeg via ffmpeg-sidecar and reads raw RGBA
//! frames from its stdout. [`SyntheticSource`] generates test patterns and
//! stands in for media files in tests and in the headless simulator.

use parking_lot::RwLock;
use proedit_core::{FrameBuffer, FrameRate, PixelFormat, ProEditError, RationalTime, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A decodable video stream.
pub trait FrameSource: Send + Sync + 'static {
    /// Identity used in cache keys.
    fn path(&self) -> &Path;

    fn frame_rate(&self) -> FrameRate;

    /// Total frames, if the source knows it up front.
    fn frame_count(&self) -> Option<usize>;

    /// Decode up to `count` frames starting at `start`, downscaled by
    /// `scale`. Returns fewer frames when the stream ends early.
    fn decode(&self, start: usize, count: usize, scale: u32) -> Result<Vec<FrameBuffer>>;
}

// ── Synthetic ───────────────────────────────────────────────────

/// Deterministic test-pattern video. Frame `i` carries seed `i`.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    path: PathBuf,
    width: u32,
    height: u32,
    frame_rate: FrameRate,
    frames: usize,
}

impl SyntheticSource {
    pub fn new(
        name: impl Into<PathBuf>,
        width: u32,
        height: u32,
        frame_rate: FrameRate,
        frames: usize,
    ) -> Self {
        Self {
            path: name.into(),
            width,
            height,
            frame_rate,
            frames,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    fn frame_count(&self) -> Option<usize> {
        Some(self.frames)
    }

    fn decode(&self, start: usize, count: usize, scale: u32) -> Result<Vec<FrameBuffer>> {
        let scale = scale.max(1);
        let end = start.saturating_add(count).min(self.frames);
        let (w, h) = ((self.width / scale).max(1), (self.height / scale).max(1));
        Ok((start..end)
            .map(|i| FrameBuffer::test_pattern(w, h, i as u64))
            .collect())
    }
}

// ── FFmpeg ──────────────────────────────────────────────────────

/// A media file decoded by an FFmpeg subprocess.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    path: PathBuf,
    frame_rate: FrameRate,
    frames: Option<usize>,
}

impl FfmpegSource {
    /// Open `path` for decoding at `frame_rate`. FFmpeg resamples the
    /// stream to that rate, so frame indices are stable across sources.
    pub fn open(path: impl Into<PathBuf>, frame_rate: FrameRate) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(ProEditError::NotFound(path.display().to_string()));
        }
        info!(path = %path.display(), rate = %frame_rate, "Opened video source");
        Ok(Self {
            path,
            frame_rate,
            frames: None,
        })
    }

    /// Set the frame count when it is known from probing.
    pub fn with_frame_count(mut self, frames: usize) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Arguments placed after the input: filters and raw RGBA output.
    pub fn output_args(&self, count: usize, scale: u32) -> Vec<String> {
        let mut args = vec![
            "-r".to_string(),
            format!("{}/{}", self.frame_rate.numerator, self.frame_rate.denominator),
            "-frames:v".to_string(),
            count.to_string(),
        ];
        if scale > 1 {
            args.push("-vf".into());
            args.push(format!("scale=iw/{scale}:ih/{scale}"));
        }
        args.extend(["-f", "rawvideo", "-pix_fmt", "rgba"].map(String::from));
        args
    }

    /// Seek position of frame `start`, in seconds.
    pub fn seek_seconds(&self, start: usize) -> f64 {
        RationalTime::from_frames(start as i64, self.frame_rate).to_seconds_f64()
    }
}

impl FrameSource for FfmpegSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    fn frame_count(&self) -> Option<usize> {
        self.frames
    }

    fn decode(&self, start: usize, count: usize, scale: u32) -> Result<Vec<FrameBuffer>> {
        use ffmpeg_sidecar::command::FfmpegCommand;

        let scale = scale.max(1);
        let mut child = FfmpegCommand::new()
            .hide_banner()
            .args(["-ss".to_string(), format!("{:.6}", self.seek_seconds(start))])
            .input(&self.path)
            .args(self.output_args(count, scale))
            .output("-")
            .spawn()
            .map_err(|e| ProEditError::Decoder(format!("Failed to spawn ffmpeg: {e}")))?;

        let mut frames = Vec::with_capacity(count);
        let iter = child
            .iter()
            .map_err(|e| ProEditError::Decoder(format!("Failed to read ffmpeg output: {e}")))?;
        for frame in iter.filter_frames() {
            frames.push(FrameBuffer::from_packed(
                frame.width,
                frame.height,
                PixelFormat::Rgba8,
                &frame.data,
            )?);
            if frames.len() == count {
                break;
            }
        }
        // The process has either exited or been asked for nothing more.
        let _ = child.kill();
        let _ = child.wait();

        debug!(
            path = %self.path.display(),
            start,
            requested = count,
            decoded = frames.len(),
            "Decoded frame run"
        );
        Ok(frames)
    }
}

// ── Frame counts ────────────────────────────────────────────────

/// Frame counts learned from decodes that hit the end of a stream.
///
/// Sources that cannot report their length up front still need one for
/// backward looping playback to find the last container.
#[derive(Debug, Default)]
pub struct FrameCountRegistry {
    counts: RwLock<HashMap<PathBuf, usize>>,
}

impl FrameCountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<usize> {
        self.counts.read().get(path).copied()
    }

    /// Record that `path` has exactly `frames` frames.
    pub fn record(&self, path: &Path, frames: usize) {
        let previous = self.counts.write().insert(path.to_path_buf(), frames);
        if previous != Some(frames) {
            debug!(path = %path.display(), frames, "Learned frame count");
        }
    }

    pub fn forget(&self, path: &Path) {
        self.counts.write().remove(path);
    }
}
