// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::Rect;

/// Size limits for render caches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderCacheRules {
    /// Largest cached area, in device pixels.
    pub max_pixels: u64,
    /// Smallest cached area, in device pixels.
    pub min_pixels: u64,
}

impl RenderCacheRules {
    /// Up to one full HD frame, and at least one pixel.
    pub const DEFAULT: Self = Self::new(1920 * 1080, 1);

    /// Rules accepting areas in `min_pixels..=max_pixels`.
    pub const fn new(max_pixels: u64, min_pixels: u64) -> Self {
        Self {
            max_pixels,
            min_pixels,
        }
    }

    /// Returns `true` if content covering `bounds` may be cached.
    ///
    /// The area is measured on `bounds` expanded to whole pixels.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "the area is finite and non-negative here; saturation is fine"
    )]
    pub fn matches(&self, bounds: Rect) -> bool {
        let bounds = bounds.abs().expand();
        if !bounds.is_finite() {
            return false;
        }
        let pixels = bounds.area() as u64;
        (self.min_pixels..=self.max_pixels).contains(&pixels)
    }
}

impl Default for RenderCacheRules {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Render cache configuration shared by every tree of a scene.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderCacheOptions {
    /// Master switch. When off, pulls ignore caches and none are created.
    pub is_enabled: bool,
    /// Size limits for new caches.
    pub rules: RenderCacheRules,
    /// Consecutive unchanged pulls required before a node is cached.
    pub min_render_count: u32,
}

impl RenderCacheOptions {
    /// Caching on, with default rules and a threshold of three frames.
    pub const DEFAULT: Self = Self {
        is_enabled: true,
        rules: RenderCacheRules::DEFAULT,
        min_render_count: 3,
    };

    /// Caching off.
    pub const DISABLED: Self = Self {
        is_enabled: false,
        ..Self::DEFAULT
    };
}

impl Default for RenderCacheOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_bound_the_pixel_area() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(RenderCacheRules::new(10_000, 1).matches(rect));
        assert!(!RenderCacheRules::new(1, 1).matches(rect));
        assert!(!RenderCacheRules::DEFAULT.matches(Rect::ZERO));
    }

    #[test]
    fn partial_pixels_count_as_whole() {
        let rect = Rect::new(0.5, 0.5, 1.5, 1.5);
        assert!(!RenderCacheRules::new(3, 1).matches(rect));
        assert!(RenderCacheRules::new(4, 4).matches(rect));
    }
}
