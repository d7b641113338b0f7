// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The canvas trait, scope operations and RAII scope guards.

use alloc::rc::Rc;
use core::fmt;
use core::ops::{Deref, DerefMut};

use kurbo::{Affine, BezPath, Point, Rect, Size};
use peniko::{BlendMode, Brush, Color, Fill as FillRule};

use crate::{
    Backdrop, Bitmap, ClipOperation, FilterDesc, FilterEffect, FormattedText, Pen, Surface,
    TransformOperator,
};

/// Clip region used by [`ScopeOp::Clip`].
#[derive(Clone, Debug, PartialEq)]
pub enum ClipShape {
    /// Axis-aligned rectangle in local coordinates.
    Rect(Rect),
    /// Arbitrary path in local coordinates.
    Path {
        /// Outline of the clip.
        path: Rc<BezPath>,
        /// Winding rule used to decide inside points.
        fill_rule: FillRule,
    },
}

impl ClipShape {
    /// Local-space bounding box of the clip.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Rect(rect) => *rect,
            Self::Path { path, .. } => kurbo::Shape::bounding_box(&**path),
        }
    }
}

/// A state change that lasts until its depth is popped.
///
/// Isolating scopes (layers, blend modes, opacity, filters and opacity
/// masks) render their content offscreen and composite it when popped.
#[derive(Clone, Debug, PartialEq)]
pub enum ScopeOp {
    /// Save transform and clip without changing them.
    Save,
    /// Isolate content, optionally limited to `bounds` in local coordinates.
    Layer {
        /// Optional local-space limit of the layer.
        bounds: Option<Rect>,
    },
    /// Composite the isolated content with a blend mode.
    BlendMode(BlendMode),
    /// Restrict drawing to a shape.
    Clip {
        /// Shape of the clip.
        shape: ClipShape,
        /// How the shape combines with the current clip.
        op: ClipOperation,
    },
    /// Composite the isolated content with a constant opacity.
    Opacity(f32),
    /// Change the current transform.
    Transform {
        /// Matrix to combine.
        matrix: Affine,
        /// How the matrix combines with the current transform.
        op: TransformOperator,
    },
    /// Apply a filter primitive to the isolated content.
    Filter(FilterDesc),
    /// Multiply the isolated content by the alpha of a brush.
    OpacityMask {
        /// Brush whose alpha is used as mask.
        brush: Brush,
        /// Local-space area painted by the mask brush.
        bounds: Rect,
        /// Use `1 - alpha` instead of alpha.
        invert: bool,
    },
}

/// Drawing surface consumed by render operations.
///
/// State changes form a stack. [`Canvas::push_state`] returns the depth that
/// [`Canvas::pop_state`] must be given to undo the push and everything pushed
/// after it. Prefer the guards from [`CanvasExt`] over calling these directly.
pub trait Canvas {
    /// Size of the target in pixels.
    fn size(&self) -> Size;

    /// Current user-to-device transform.
    fn transform(&self) -> Affine;

    /// Number of states currently pushed.
    fn state_depth(&self) -> usize;

    /// Push a state and return the depth to restore.
    fn push_state(&mut self, op: ScopeOp) -> usize;

    /// Pop states until `depth` states remain.
    fn pop_state(&mut self, depth: usize);

    /// Fill the whole target with `color`, or transparent.
    ///
    /// Ignores transform and clip.
    fn clear(&mut self, color: Option<Color>);

    /// Draw a rectangle.
    fn draw_rectangle(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>);

    /// Draw the ellipse inscribed in `rect`.
    fn draw_ellipse(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>);

    /// Draw a path.
    fn draw_geometry(
        &mut self,
        path: &BezPath,
        fill_rule: FillRule,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    );

    /// Draw measured text.
    fn draw_text(&mut self, text: &FormattedText, fill: Option<&Brush>, pen: Option<&Pen>);

    /// Draw a bitmap stretched over `dest`.
    ///
    /// The pen, if any, strokes the outline of `dest`.
    fn draw_image(&mut self, image: &Bitmap, dest: Rect, fill: Option<&Brush>, pen: Option<&Pen>);

    /// Draw a surface with its top-left corner at `position`.
    fn draw_surface(&mut self, surface: &Surface, position: Point);

    /// Capture the pixels drawn so far.
    ///
    /// Returns `None` if the backend cannot read back its target.
    fn snapshot(&mut self) -> Option<Backdrop>;

    /// Draw a captured backdrop in device space.
    fn draw_backdrop(&mut self, backdrop: &Backdrop);
}

/// Guard that pops a canvas back to a saved depth when dropped.
///
/// Derefs to the canvas so drawing continues through the guard.
pub struct PushedState<'a, C: Canvas + ?Sized> {
    canvas: &'a mut C,
    depth: usize,
}

impl<'a, C: Canvas + ?Sized> PushedState<'a, C> {
    /// Guard `canvas` so it returns to `depth` when dropped.
    pub fn new(canvas: &'a mut C, depth: usize) -> Self {
        Self { canvas, depth }
    }

    /// Depth restored on drop.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Pop now instead of at the end of the scope.
    pub fn pop(self) {}
}

impl<C: Canvas + ?Sized> Drop for PushedState<'_, C> {
    fn drop(&mut self) {
        self.canvas.pop_state(self.depth);
    }
}

impl<C: Canvas + ?Sized> Deref for PushedState<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.canvas
    }
}

impl<C: Canvas + ?Sized> DerefMut for PushedState<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.canvas
    }
}

impl<C: Canvas + ?Sized> fmt::Debug for PushedState<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushedState")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// Scoped helpers over [`Canvas`].
pub trait CanvasExt: Canvas {
    /// Push a state and return a guard for it.
    fn push_scope(&mut self, op: ScopeOp) -> PushedState<'_, Self> {
        let depth = self.push_state(op);
        PushedState::new(self, depth)
    }

    /// Save transform and clip.
    fn push(&mut self) -> PushedState<'_, Self> {
        self.push_scope(ScopeOp::Save)
    }

    /// Isolate content into a layer.
    fn push_layer(&mut self, bounds: Option<Rect>) -> PushedState<'_, Self> {
        self.push_scope(ScopeOp::Layer { bounds })
    }

    /// Composite content with `mode`.
    fn push_blend_mode(&mut self, mode: BlendMode) -> PushedState<'_, Self> {
        self.push_scope(ScopeOp::BlendMode(mode))
    }

    /// Clip to a rectangle.
    fn push_clip(&mut self, rect: Rect, op: ClipOperation) -> PushedState<'_, Self> {
        self.push_scope(ScopeOp::Clip {
            shape: ClipShape::Rect(rect),
            op,
        })
    }

    /// Clip to a path.
    fn push_geometry_clip(
        &mut self,
        path: Rc<BezPath>,
        fill_rule: FillRule,
        op: ClipOperation,
    ) -> PushedState<'_, Self> {
        self.push_scope(ScopeOp::Clip {
            shape: ClipShape::Path { path, fill_rule },
            op,
        })
    }

    /// Composite content with a constant opacity.
    fn push_opacity(&mut self, opacity: f32) -> PushedState<'_, Self> {
        self.push_scope(ScopeOp::Opacity(opacity))
    }

    /// Change the transform.
    fn push_transform(&mut self, matrix: Affine, op: TransformOperator) -> PushedState<'_, Self> {
        self.push_scope(ScopeOp::Transform { matrix, op })
    }

    /// Apply a filter effect.
    ///
    /// Groups push one state per primitive; the single guard pops them all.
    fn push_filter_effect(&mut self, effect: &FilterEffect) -> PushedState<'_, Self> {
        let depth = self.state_depth();
        for desc in effect.push_order() {
            self.push_state(ScopeOp::Filter(desc.clone()));
        }
        PushedState::new(self, depth)
    }

    /// Mask content by the alpha of a brush.
    fn push_opacity_mask(
        &mut self,
        brush: Brush,
        bounds: Rect,
        invert: bool,
    ) -> PushedState<'_, Self> {
        self.push_scope(ScopeOp::OpacityMask {
            brush,
            bounds,
            invert,
        })
    }

    /// Run `f` with a state pushed, popping it afterwards.
    fn with_state<R>(&mut self, op: ScopeOp, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.push_state(op);
        let out = f(self);
        self.pop_state(depth);
        out
    }
}

impl<C: Canvas + ?Sized> CanvasExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullCanvas;
    use alloc::vec;

    #[test]
    fn guards_restore_depth_and_transform() {
        let mut canvas = NullCanvas::new(10, 10);
        {
            let mut outer = canvas.push_transform(Affine::scale(2.0), TransformOperator::Prepend);
            assert_eq!(outer.state_depth(), 1);
            {
                let inner = outer.push_opacity(0.5);
                assert_eq!(inner.state_depth(), 2);
                assert_eq!(inner.transform(), Affine::scale(2.0));
            }
            assert_eq!(outer.state_depth(), 1);
        }
        assert_eq!(canvas.state_depth(), 0);
        assert_eq!(canvas.transform(), Affine::IDENTITY);
    }

    #[test]
    fn filter_groups_pop_together() {
        let mut canvas = NullCanvas::new(10, 10);
        let effect = FilterEffect::Group(vec![
            FilterDesc::blur(1.0).into(),
            FilterDesc::offset(1.0, 1.0).into(),
        ]);
        {
            let guard = canvas.push_filter_effect(&effect);
            assert_eq!(guard.state_depth(), 2);
            assert_eq!(guard.depth(), 0);
        }
        assert_eq!(canvas.state_depth(), 0);
    }

    #[test]
    fn with_state_pops_after_closure() {
        let mut canvas = NullCanvas::new(10, 10);
        let depth = canvas.with_state(ScopeOp::Save, |c| c.state_depth());
        assert_eq!(depth, 1);
        assert_eq!(canvas.state_depth(), 0);
    }

    #[test]
    fn clip_shape_bounds() {
        let mut path = BezPath::new();
        path.move_to((1.0, 2.0));
        path.line_to((5.0, 8.0));
        let shape = ClipShape::Path {
            path: Rc::new(path),
            fill_rule: FillRule::NonZero,
        };
        assert_eq!(shape.bounds(), Rect::new(1.0, 2.0, 5.0, 8.0));
    }
}
