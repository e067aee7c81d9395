//! 3D LUT parsing and application.
//!
//! Two on-disk forms are supported: Adobe `.cube` text files, and "strip"
//! images where `size` tiles of `size x size` pixels sit side by side
//! (width = size², height = size). In a strip, the tile index is blue, the
//! column within the tile is red and the row is green.

use crate::error::ColorError;
use proedit_core::{FrameBuffer, PixelFormat};
use rayon::prelude::*;

/// 3D Look-Up Table, red-fastest.
#[derive(Debug, Clone)]
pub struct Lut3D {
    pub size: usize,
    pub data: Vec<[f32; 3]>,
    pub domain_min: [f32; 3],
    pub domain_max: [f32; 3],
}

fn parse_triplet(text: &str) -> Option<[f32; 3]> {
    let vals: Vec<f32> = text
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    (vals.len() == 3).then(|| [vals[0], vals[1], vals[2]])
}

impl Lut3D {
    /// Lattice that maps every color to itself.
    pub fn identity(size: usize) -> Result<Self, ColorError> {
        if size < 2 {
            return Err(ColorError::InvalidLut("LUT size must be at least 2".into()));
        }
        let n = (size - 1) as f32;
        let mut data = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    data.push([r as f32 / n, g as f32 / n, b as f32 / n]);
                }
            }
        }
        Ok(Self {
            size,
            data,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
        })
    }

    /// Parse a .cube file containing a 3D LUT.
    pub fn from_cube(content: &str) -> Result<Self, ColorError> {
        let mut size = 0usize;
        let mut data = Vec::new();
        let mut domain_min = [0.0f32; 3];
        let mut domain_max = [1.0f32; 3];

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("TITLE") {
                continue;
            }
            if let Some(rest) = line.strip_prefix("LUT_3D_SIZE") {
                size = rest
                    .trim()
                    .parse()
                    .map_err(|e| ColorError::Parse(format!("bad LUT_3D_SIZE: {}", e)))?;
                continue;
            }
            if let Some(rest) = line.strip_prefix("DOMAIN_MIN") {
                if let Some(v) = parse_triplet(rest) {
                    domain_min = v;
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix("DOMAIN_MAX") {
                if let Some(v) = parse_triplet(rest) {
                    domain_max = v;
                }
                continue;
            }
            if line.starts_with("LUT_1D_SIZE") {
                return Err(ColorError::InvalidLut("expected 3D LUT, got 1D".into()));
            }

            if let Some(v) = parse_triplet(line) {
                data.push(v);
            }
        }

        if size == 0 {
            return Err(ColorError::InvalidLut("missing LUT_3D_SIZE".into()));
        }
        if size < 2 {
            return Err(ColorError::InvalidLut("LUT size must be at least 2".into()));
        }
        let expected = size
            .checked_mul(size)
            .and_then(|n| n.checked_mul(size))
            .ok_or_else(|| ColorError::InvalidLut(format!("LUT size {size} is too large")))?;
        if data.len() != expected {
            return Err(ColorError::DimensionMismatch {
                expected,
                got: data.len(),
            });
        }

        Ok(Self {
            size,
            data,
            domain_min,
            domain_max,
        })
    }

    /// Build a LUT from a strip image. The size is the integer square root
    /// of the width and must match the height.
    pub fn from_strip(image: &FrameBuffer) -> Result<Self, ColorError> {
        if image.format != PixelFormat::Rgba8 {
            return Err(ColorError::InvalidLut("strip image must be RGBA8".into()));
        }
        let width = image.width as usize;
        let size = ((width as f64 + 0.5).sqrt()) as usize;
        if size < 2 || size * size != width {
            return Err(ColorError::InvalidLut(format!(
                "strip width {width} is not a square of the LUT size"
            )));
        }
        if image.height as usize != size {
            return Err(ColorError::DimensionMismatch {
                expected: size,
                got: image.height as usize,
            });
        }

        let mut data = vec![[0.0f32; 3]; size * size * size];
        for g in 0..size {
            let row = image.row(g as u32);
            for x in 0..width {
                let (b, r) = (x / size, x % size);
                let px = &row[x * 4..x * 4 + 3];
                data[r + g * size + b * size * size] =
                    [px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0];
            }
        }

        Ok(Self {
            size,
            data,
            domain_min: [0.0; 3],
            domain_max: [1.0; 3],
        })
    }

    /// Apply the 3D LUT to an RGB triplet using trilinear interpolation.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let s = self.size;
        let n = (s - 1) as f32;

        let mut coords = [0.0f32; 3];
        for c in 0..3 {
            let range = self.domain_max[c] - self.domain_min[c];
            let t = if range.abs() < 1e-10 {
                0.0
            } else {
                ((rgb[c] - self.domain_min[c]) / range).clamp(0.0, 1.0)
            };
            coords[c] = t * n;
        }

        let r0 = (coords[0] as usize).min(s - 2);
        let g0 = (coords[1] as usize).min(s - 2);
        let b0 = (coords[2] as usize).min(s - 2);
        let (r1, g1, b1) = (r0 + 1, g0 + 1, b0 + 1);
        let fr = coords[0] - r0 as f32;
        let fg = coords[1] - g0 as f32;
        let fb = coords[2] - b0 as f32;

        let idx = |r: usize, g: usize, b: usize| -> usize { r + g * s + b * s * s };

        let c000 = self.data[idx(r0, g0, b0)];
        let c100 = self.data[idx(r1, g0, b0)];
        let c010 = self.data[idx(r0, g1, b0)];
        let c110 = self.data[idx(r1, g1, b0)];
        let c001 = self.data[idx(r0, g0, b1)];
        let c101 = self.data[idx(r1, g0, b1)];
        let c011 = self.data[idx(r0, g1, b1)];
        let c111 = self.data[idx(r1, g1, b1)];

        let mut out = [0.0f32; 3];
        for c in 0..3 {
            let c00 = c000[c] * (1.0 - fr) + c100[c] * fr;
            let c10 = c010[c] * (1.0 - fr) + c110[c] * fr;
            let c01 = c001[c] * (1.0 - fr) + c101[c] * fr;
            let c11 = c011[c] * (1.0 - fr) + c111[c] * fr;
            let c0 = c00 * (1.0 - fg) + c10 * fg;
            let c1 = c01 * (1.0 - fg) + c11 * fg;
            out[c] = c0 * (1.0 - fb) + c1 * fb;
        }
        out
    }

    /// Grade an RGBA8 frame in place, rows in parallel. Alpha is untouched.
    pub fn apply_to_frame(&self, frame: &mut FrameBuffer) -> Result<(), ColorError> {
        if frame.format != PixelFormat::Rgba8 {
            return Err(ColorError::InvalidLut("can only grade RGBA8 frames".into()));
        }
        let row_bytes = frame.width as usize * 4;
        let stride = frame.stride;
        if stride == 0 {
            return Ok(());
        }
        frame.data.par_chunks_mut(stride).for_each(|row| {
            for px in row[..row_bytes].chunks_exact_mut(4) {
                let graded = self.apply([
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                ]);
                for c in 0..3 {
                    px[c] = (graded[c].clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        });
        Ok(())
    }

    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<[f32; 3]>()
    }
}
