//! Decoded frames held in CPU memory.
//!
//! Both still images and video frames end up as a [`FrameBuffer`]; caches
//! hand them out as [`SharedFrameBuffer`] so a frame can outlive the
//! container it was decoded into.

use crate::error::{ProEditError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel layout of a [`FrameBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit grayscale
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }
}

/// A single-plane frame with a 64-byte aligned row stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including padding.
    pub stride: usize,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a zeroed frame.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = aligned_stride(width, format);
        Self {
            format,
            width,
            height,
            stride,
            data: vec![0u8; stride * height as usize],
        }
    }

    /// Build a frame from tightly packed pixels (no row padding), as produced
    /// by image decoders and raw FFmpeg output.
    pub fn from_packed(width: u32, height: u32, format: PixelFormat, packed: &[u8]) -> Result<Self> {
        let row_len = width as usize * format.bytes_per_pixel();
        let expected = row_len * height as usize;
        if packed.len() != expected {
            return Err(ProEditError::InvalidParameter(format!(
                "packed {}x{} {:?} frame needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                packed.len()
            )));
        }

        let mut frame = Self::new(width, height, format);
        if row_len > 0 {
            for (y, src) in packed.chunks_exact(row_len).enumerate() {
                frame.row_mut(y as u32).copy_from_slice(src);
            }
        }
        Ok(frame)
    }

    /// Pixel bytes of row `y`, without padding.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_len()]
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.row_len();
        &mut self.data[start..start + len]
    }

    /// RGBA value at `(x, y)`. Grayscale frames replicate the channel.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let row = self.row(y);
        match self.format {
            PixelFormat::Rgba8 => {
                let i = x as usize * 4;
                [row[i], row[i + 1], row[i + 2], row[i + 3]]
            }
            PixelFormat::Gray8 => {
                let v = row[x as usize];
                [v, v, v, 255]
            }
        }
    }

    /// Total memory usage in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Color bars shifted by `seed` so consecutive synthetic frames differ.
    ///
    /// The first pixel's red channel carries `seed % 256`, which lets tests
    /// identify which frame they got back.
    pub fn test_pattern(width: u32, height: u32, seed: u64) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255],
            [255, 255, 0, 255],
            [0, 255, 255, 255],
            [0, 255, 0, 255],
            [255, 0, 255, 255],
            [255, 0, 0, 255],
            [0, 0, 255, 255],
            [0, 0, 0, 255],
        ];

        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let bar = ((x as u64 * 8 / width.max(1) as u64 + seed) % 8) as usize;
                let i = x as usize * 4;
                row[i..i + 4].copy_from_slice(&BARS[bar]);
            }
        }
        if width > 0 && height > 0 {
            frame.row_mut(0)[0] = (seed % 256) as u8;
        }
        frame
    }

    fn row_len(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }
}

fn aligned_stride(width: u32, format: PixelFormat) -> usize {
    let min_stride = width as usize * format.bytes_per_pixel();
    (min_stride + 63) & !63
}

/// Arc-wrapped frame buffer for shared ownership.
pub type SharedFrameBuffer = Arc<FrameBuffer>;
