// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pens and the small enums that parameterize scope pushes.

use kurbo::{Affine, Join, Rect, Stroke};
use peniko::Brush;

/// Stroke paint: a brush plus a kurbo stroke style.
#[derive(Clone, Debug, PartialEq)]
pub struct Pen {
    /// Brush used to paint the stroke.
    pub brush: Brush,
    /// Width, joins, caps and dashes.
    pub style: Stroke,
}

impl Pen {
    /// Create a pen with default joins and caps.
    pub fn new(brush: impl Into<Brush>, width: f64) -> Self {
        Self {
            brush: brush.into(),
            style: Stroke::new(width),
        }
    }

    /// Replace the stroke style.
    #[must_use]
    pub fn with_style(mut self, style: Stroke) -> Self {
        self.style = style;
        self
    }

    /// Distance a stroked outline can extend past the geometry it strokes.
    ///
    /// Miter joins can reach `miter_limit * width / 2`, other joins stay within
    /// `sqrt(2) * width / 2` at square caps.
    pub fn outset(&self) -> f64 {
        let half = self.style.width * 0.5;
        let factor = match self.style.join {
            Join::Miter => self.style.miter_limit.max(core::f64::consts::SQRT_2),
            Join::Bevel | Join::Round => core::f64::consts::SQRT_2,
        };
        half * factor
    }

    /// Grow `rect` to cover the stroke of an optional pen.
    pub fn inflate_bounds(pen: Option<&Self>, rect: Rect) -> Rect {
        match pen {
            Some(pen) if pen.style.width > 0.0 => {
                let d = pen.outset();
                rect.inflate(d, d)
            }
            _ => rect,
        }
    }
}

/// How a pushed clip combines with the current clip.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClipOperation {
    /// Keep only the area inside both clips.
    #[default]
    Intersect,
    /// Remove the pushed shape from the current clip.
    Difference,
}

/// How a pushed transform combines with the current transform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransformOperator {
    /// Apply the new matrix in local space, before the current transform.
    #[default]
    Prepend,
    /// Apply the new matrix after the current transform.
    Append,
    /// Replace the current transform.
    Set,
}

impl TransformOperator {
    /// Combine `matrix` with `current` according to this operator.
    pub fn apply(self, current: Affine, matrix: Affine) -> Affine {
        match self {
            Self::Prepend => current * matrix,
            Self::Append => matrix * current,
            Self::Set => matrix,
        }
    }
}
