// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A canvas that tracks state but draws nothing.

use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Point, Rect, Size};
use peniko::{Brush, Color, Fill as FillRule};

use crate::{Backdrop, Bitmap, Canvas, FormattedText, Pen, ScopeOp, Surface};

/// Canvas used when no backend is available.
///
/// It keeps the transform stack so that callers observing
/// [`Canvas::transform`] see consistent values, and discards every draw.
#[derive(Clone, Debug)]
pub struct NullCanvas {
    size: Size,
    transform: Affine,
    saved: Vec<Affine>,
}

impl NullCanvas {
    /// Create a null canvas reporting the given pixel size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Size::new(f64::from(width), f64::from(height)),
            transform: Affine::IDENTITY,
            saved: Vec::new(),
        }
    }
}

impl Canvas for NullCanvas {
    fn size(&self) -> Size {
        self.size
    }

    fn transform(&self) -> Affine {
        self.transform
    }

    fn state_depth(&self) -> usize {
        self.saved.len()
    }

    fn push_state(&mut self, op: ScopeOp) -> usize {
        let depth = self.saved.len();
        self.saved.push(self.transform);
        if let ScopeOp::Transform { matrix, op } = op {
            self.transform = op.apply(self.transform, matrix);
        }
        depth
    }

    fn pop_state(&mut self, depth: usize) {
        if depth < self.saved.len() {
            self.transform = self.saved[depth];
            self.saved.truncate(depth);
        }
    }

    fn clear(&mut self, _color: Option<Color>) {}

    fn draw_rectangle(&mut self, _rect: Rect, _fill: Option<&Brush>, _pen: Option<&Pen>) {}

    fn draw_ellipse(&mut self, _rect: Rect, _fill: Option<&Brush>, _pen: Option<&Pen>) {}

    fn draw_geometry(
        &mut self,
        _path: &BezPath,
        _fill_rule: FillRule,
        _fill: Option<&Brush>,
        _pen: Option<&Pen>,
    ) {
    }

    fn draw_text(&mut self, _text: &FormattedText, _fill: Option<&Brush>, _pen: Option<&Pen>) {}

    fn draw_image(
        &mut self,
        _image: &Bitmap,
        _dest: Rect,
        _fill: Option<&Brush>,
        _pen: Option<&Pen>,
    ) {
    }

    fn draw_surface(&mut self, _surface: &Surface, _position: Point) {}

    fn snapshot(&mut self) -> Option<Backdrop> {
        None
    }

    fn draw_backdrop(&mut self, _backdrop: &Backdrop) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransformOperator;

    #[test]
    fn pop_restores_transform_at_depth() {
        let mut canvas = NullCanvas::new(8, 8);
        let d0 = canvas.push_state(ScopeOp::Transform {
            matrix: Affine::translate((1.0, 0.0)),
            op: TransformOperator::Prepend,
        });
        canvas.push_state(ScopeOp::Transform {
            matrix: Affine::translate((0.0, 1.0)),
            op: TransformOperator::Prepend,
        });
        assert_eq!(canvas.transform(), Affine::translate((1.0, 1.0)));
        canvas.pop_state(d0);
        assert_eq!(canvas.transform(), Affine::IDENTITY);
        assert_eq!(canvas.state_depth(), 0);
        // Popping an already restored depth is harmless.
        canvas.pop_state(3);
        assert!(canvas.snapshot().is_none());
    }
}
