// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Filter effects applied to isolated layers.

use alloc::vec::Vec;
use kurbo::{Rect, Vec2};
use peniko::Color;

/// Description of a single filter primitive.
///
/// A filter is applied to the pixels of an isolated layer when the layer is
/// popped. Lengths are in user space; backends scale them by the transform
/// active when the filter was pushed.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterDesc {
    /// Fill the layer with a solid color (aka `feFlood`).
    ///
    /// The source content is ignored. The result is still affected by the clip.
    Flood {
        /// Flood color.
        color: Color,
    },
    /// Gaussian blur with separate X/Y standard deviation values.
    Blur {
        /// Standard deviation along the X axis.
        std_deviation_x: f32,
        /// Standard deviation along the Y axis.
        std_deviation_y: f32,
    },
    /// Blurred, tinted copy of the content drawn beneath it.
    DropShadow {
        /// Shadow offset along the X axis.
        dx: f32,
        /// Shadow offset along the Y axis.
        dy: f32,
        /// Blur standard deviation along the X axis.
        std_deviation_x: f32,
        /// Blur standard deviation along the Y axis.
        std_deviation_y: f32,
        /// Shadow color.
        color: Color,
    },
    /// Translate the layer output (aka `feOffset`).
    Offset {
        /// Offset along the X axis.
        dx: f32,
        /// Offset along the Y axis.
        dy: f32,
    },
}

impl FilterDesc {
    /// Create a flood filter.
    #[inline]
    pub const fn flood(color: Color) -> Self {
        Self::Flood { color }
    }

    /// Create a uniform Gaussian blur filter.
    #[inline]
    pub const fn blur(sigma: f32) -> Self {
        Self::Blur {
            std_deviation_x: sigma,
            std_deviation_y: sigma,
        }
    }

    /// Create a Gaussian blur filter with separate X/Y sigma values.
    #[inline]
    pub const fn blur_xy(std_deviation_x: f32, std_deviation_y: f32) -> Self {
        Self::Blur {
            std_deviation_x,
            std_deviation_y,
        }
    }

    /// Create a drop shadow filter.
    #[inline]
    pub const fn drop_shadow(dx: f32, dy: f32, sigma: f32, color: Color) -> Self {
        Self::DropShadow {
            dx,
            dy,
            std_deviation_x: sigma,
            std_deviation_y: sigma,
            color,
        }
    }

    /// Create an offset/translation filter.
    #[inline]
    pub const fn offset(dx: f32, dy: f32) -> Self {
        Self::Offset { dx, dy }
    }

    /// Area touched by this filter when its input covers `bounds`.
    ///
    /// Blurs reach three standard deviations past their input.
    pub fn transform_bounds(&self, bounds: Rect) -> Rect {
        match *self {
            Self::Flood { .. } => bounds,
            Self::Blur {
                std_deviation_x,
                std_deviation_y,
            } => bounds.inflate(
                3.0 * f64::from(std_deviation_x),
                3.0 * f64::from(std_deviation_y),
            ),
            Self::DropShadow {
                dx,
                dy,
                std_deviation_x,
                std_deviation_y,
                ..
            } => {
                let shadow = (bounds + Vec2::new(f64::from(dx), f64::from(dy))).inflate(
                    3.0 * f64::from(std_deviation_x),
                    3.0 * f64::from(std_deviation_y),
                );
                bounds.union(shadow)
            }
            Self::Offset { dx, dy } => bounds + Vec2::new(f64::from(dx), f64::from(dy)),
        }
    }
}

/// A filter primitive or an ordered group of effects.
///
/// Group members apply in order: the first member sees the source content
/// and each later member sees the previous result.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterEffect {
    /// One filter primitive.
    Single(FilterDesc),
    /// Effects applied one after another.
    Group(Vec<FilterEffect>),
}

impl FilterEffect {
    /// Primitives in the order they must be pushed onto a canvas.
    ///
    /// The last pushed layer is the innermost one and is resolved first, so
    /// groups are expanded back to front.
    pub fn push_order(&self) -> Vec<&FilterDesc> {
        let mut out = Vec::new();
        self.collect_push_order(&mut out);
        out
    }

    fn collect_push_order<'a>(&'a self, out: &mut Vec<&'a FilterDesc>) {
        match self {
            Self::Single(desc) => out.push(desc),
            Self::Group(children) => {
                for child in children.iter().rev() {
                    child.collect_push_order(out);
                }
            }
        }
    }

    /// Area touched by the whole effect when its input covers `bounds`.
    pub fn transform_bounds(&self, bounds: Rect) -> Rect {
        match self {
            Self::Single(desc) => desc.transform_bounds(bounds),
            Self::Group(children) => children
                .iter()
                .fold(bounds, |acc, child| child.transform_bounds(acc)),
        }
    }

    /// Returns `true` if this is an empty group.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(_) => false,
            Self::Group(children) => children.iter().all(Self::is_empty),
        }
    }
}

impl From<FilterDesc> for FilterEffect {
    fn from(desc: FilterDesc) -> Self {
        Self::Single(desc)
    }
}
