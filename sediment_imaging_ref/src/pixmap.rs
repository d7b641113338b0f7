// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Premultiplied RGBA pixel buffers and compositing math.

use peniko::{BlendMode, Color, Compose, Mix};

/// Premultiplied RGBA color with components in `[0, 1]`.
pub type Premul = [f32; 4];

const TRANSPARENT: Premul = [0.0; 4];

/// A premultiplied RGBA32F pixel buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    data: Vec<Premul>,
}

impl Pixmap {
    /// A transparent pixmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![TRANSPARENT; width as usize * height as usize],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All pixels in row-major order.
    pub fn data(&self) -> &[Premul] {
        &self.data
    }

    /// Premultiplied pixel at `(x, y)`; transparent outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Premul {
        self.index(x, y).map_or(TRANSPARENT, |i| self.data[i])
    }

    /// Straight-alpha RGBA8 value of the pixel at `(x, y)`.
    pub fn pixel_rgba8(&self, x: u32, y: u32) -> [u8; 4] {
        let [r, g, b, a] = self.pixel(x, y);
        if a <= 0.0 {
            return [0; 4];
        }
        [
            to_u8(r / a),
            to_u8(g / a),
            to_u8(b / a),
            to_u8(a),
        ]
    }

    /// Largest per-channel difference to another pixmap of the same size.
    ///
    /// Returns `None` if the sizes differ.
    pub fn max_difference(&self, other: &Self) -> Option<f32> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .flat_map(|(a, b)| a.iter().zip(b).map(|(x, y)| (x - y).abs()))
                .fold(0.0, f32::max),
        )
    }

    /// Set every pixel.
    pub fn fill(&mut self, color: Premul) {
        self.data.fill(color);
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    pub(crate) fn set(&mut self, x: u32, y: u32, color: Premul) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = color;
        }
    }

    pub(crate) fn data_mut(&mut self) -> &mut [Premul] {
        &mut self.data
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "value is clamped to [0, 255] before casting"
)]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Premultiply a straight-alpha color.
pub(crate) fn premultiply(color: Color) -> Premul {
    let [r, g, b, a] = color.components;
    [r * a, g * a, b * a, a]
}

/// Scale every channel by `k`.
pub(crate) fn scale(c: Premul, k: f32) -> Premul {
    [c[0] * k, c[1] * k, c[2] * k, c[3] * k]
}

/// Porter-Duff source-over.
pub(crate) fn src_over(dst: Premul, src: Premul) -> Premul {
    let inv = 1.0 - src[3];
    [
        src[0] + dst[0] * inv,
        src[1] + dst[1] * inv,
        src[2] + dst[2] * inv,
        src[3] + dst[3] * inv,
    ]
}

/// Returns `true` if `mode` is composited exactly by [`blend`].
pub(crate) fn is_supported(mode: BlendMode) -> bool {
    matches!(mode.compose, Compose::SrcOver)
        && matches!(
            mode.mix,
            Mix::Normal | Mix::Multiply | Mix::Screen | Mix::Darken | Mix::Lighten | Mix::Difference
        )
}

/// Separable blend followed by source-over.
///
/// Unsupported mixes fall back to normal blending.
pub(crate) fn blend(dst: Premul, src: Premul, mode: BlendMode) -> Premul {
    let mix = mode.mix;
    if matches!(mix, Mix::Normal) || !is_supported(mode) {
        return src_over(dst, src);
    }
    let (sa, da) = (src[3], dst[3]);
    if sa <= 0.0 {
        return dst;
    }
    if da <= 0.0 {
        return src;
    }
    let mut out = [0.0; 4];
    for i in 0..3 {
        let cs = src[i] / sa;
        let cb = dst[i] / da;
        let b = match mix {
            Mix::Multiply => cs * cb,
            Mix::Screen => cs + cb - cs * cb,
            Mix::Darken => cs.min(cb),
            Mix::Lighten => cs.max(cb),
            Mix::Difference => (cs - cb).abs(),
            _ => cs,
        };
        out[i] = (1.0 - da) * src[i] + (1.0 - sa) * dst[i] + sa * da * b;
    }
    out[3] = sa + da - sa * da;
    out
}
