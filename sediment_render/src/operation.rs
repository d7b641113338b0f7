// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render operations: the flat, per-frame output of a pull.
//!
//! Operations own everything they draw. They are rendered in order and then
//! dropped; dropping is the disposal point, so resources held only by an
//! operation are released exactly once when the frame is done with it.

use std::fmt;

use kurbo::{Affine, Point, Rect};
use sediment_imaging::{Canvas, ClipOperation, ClipShape, PushedState, ScopeOp, Surface};

/// A unit of drawing produced by processing a node.
pub trait Operation: fmt::Debug {
    /// Area the operation may touch, in the coordinates it is drawn in.
    ///
    /// Never NaN.
    fn bounds(&self) -> Rect;

    /// Draw onto `canvas`.
    fn render(&self, canvas: &mut dyn Canvas);

    /// Returns `true` if `point` hits the drawn content.
    fn hit_test(&self, point: Point) -> bool;

    /// Hit test with the operation drawn under `transform`.
    ///
    /// `point` is in the space `transform` maps into. A singular transform
    /// hits nothing.
    fn hit_test_transformed(&self, point: Point, transform: Affine) -> bool {
        invert(transform).is_some_and(|inverse| self.hit_test(inverse * point))
    }
}

fn invert(transform: Affine) -> Option<Affine> {
    (transform.determinant().abs() >= f64::EPSILON).then(|| transform.inverse())
}

/// An owned operation.
pub type BoxedOperation = Box<dyn Operation>;

/// Replace NaN bounds with an empty rectangle.
pub(crate) fn sanitize(rect: Rect) -> Rect {
    if rect.is_nan() { Rect::ZERO } else { rect }
}

/// Union of the bounds of `ops`, or `None` if there are none.
pub fn union_bounds(ops: &[BoxedOperation]) -> Option<Rect> {
    ops.iter().map(|op| op.bounds()).reduce(|a, b| a.union(b))
}

type RenderFn = Box<dyn Fn(&mut dyn Canvas)>;
type HitTestFn = Box<dyn Fn(Point) -> bool>;
type DisposeFn = Box<dyn FnOnce()>;

/// An operation built from closures.
///
/// The optional dispose closure runs once when the operation is dropped.
pub struct LambdaOperation {
    bounds: Rect,
    render: RenderFn,
    hit_test: Option<HitTestFn>,
    on_dispose: Option<DisposeFn>,
}

impl LambdaOperation {
    /// An operation that draws with `render` and is never hit.
    pub fn new(bounds: Rect, render: impl Fn(&mut dyn Canvas) + 'static) -> Self {
        Self {
            bounds: sanitize(bounds),
            render: Box::new(render),
            hit_test: None,
            on_dispose: None,
        }
    }

    /// Use `hit_test` for point queries.
    pub fn with_hit_test(mut self, hit_test: impl Fn(Point) -> bool + 'static) -> Self {
        self.hit_test = Some(Box::new(hit_test));
        self
    }

    /// Run `on_dispose` when the operation is dropped.
    pub fn on_dispose(mut self, on_dispose: impl FnOnce() + 'static) -> Self {
        self.on_dispose = Some(Box::new(on_dispose));
        self
    }
}

impl Operation for LambdaOperation {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        (self.render)(canvas);
    }

    fn hit_test(&self, point: Point) -> bool {
        self.hit_test.as_ref().is_some_and(|f| f(point))
    }
}

impl Drop for LambdaOperation {
    fn drop(&mut self) {
        if let Some(on_dispose) = self.on_dispose.take() {
            on_dispose();
        }
    }
}

impl fmt::Debug for LambdaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaOperation")
            .field("bounds", &self.bounds)
            .field("has_hit_test", &self.hit_test.is_some())
            .field("has_dispose", &self.on_dispose.is_some())
            .finish_non_exhaustive()
    }
}

/// Decorator that draws inner operations inside a set of canvas states.
#[derive(Debug)]
pub struct ScopedOperation {
    states: Vec<ScopeOp>,
    inner: Vec<BoxedOperation>,
    bounds: Rect,
}

impl ScopedOperation {
    /// Draw `inner` with `states` pushed in order.
    pub fn new(states: Vec<ScopeOp>, inner: Vec<BoxedOperation>, bounds: Rect) -> Self {
        Self {
            states,
            inner,
            bounds: sanitize(bounds),
        }
    }

    /// The wrapped operations.
    pub fn inner(&self) -> &[BoxedOperation] {
        &self.inner
    }
}

fn clip_contains(shape: &ClipShape, point: Point) -> bool {
    match shape {
        ClipShape::Rect(rect) => rect.contains(point),
        ClipShape::Path { path, fill_rule } => {
            let w = kurbo::Shape::winding(&**path, point);
            match fill_rule {
                peniko::Fill::NonZero => w != 0,
                peniko::Fill::EvenOdd => w % 2 != 0,
            }
        }
    }
}

impl Operation for ScopedOperation {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        let depth = canvas.state_depth();
        for state in &self.states {
            canvas.push_state(state.clone());
        }
        let mut scoped = PushedState::new(canvas, depth);
        for op in &self.inner {
            op.render(&mut *scoped);
        }
    }

    fn hit_test(&self, point: Point) -> bool {
        self.hit_test_transformed(point, Affine::IDENTITY)
    }

    /// Combines pushed transforms with `transform` the way a canvas does and
    /// rejects points outside pushed clips.
    fn hit_test_transformed(&self, point: Point, transform: Affine) -> bool {
        let mut current = transform;
        for state in &self.states {
            match state {
                ScopeOp::Transform { matrix, op } => current = op.apply(current, *matrix),
                ScopeOp::Clip { shape, op } => {
                    let Some(inverse) = invert(current) else {
                        return false;
                    };
                    let inside = clip_contains(shape, inverse * point);
                    let keep = match op {
                        ClipOperation::Intersect => inside,
                        ClipOperation::Difference => !inside,
                    };
                    if !keep {
                        return false;
                    }
                }
                ScopeOp::Layer {
                    bounds: Some(limit),
                } => {
                    if !invert(current).is_some_and(|inverse| limit.contains(inverse * point)) {
                        return false;
                    }
                }
                _ => {}
            }
        }
        self.inner
            .iter()
            .rev()
            .any(|op| op.hit_test_transformed(point, current))
    }
}

/// Draws a cached surface at the origin of its recorded bounds.
#[derive(Debug)]
pub struct CachedSurfaceOperation {
    surface: Surface,
    bounds: Rect,
}

impl CachedSurfaceOperation {
    /// Operation drawing `surface` so that it covers `bounds`.
    pub fn new(surface: Surface, bounds: Rect) -> Self {
        Self {
            surface,
            bounds: sanitize(bounds),
        }
    }
}

impl Operation for CachedSurfaceOperation {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        canvas.draw_surface(&self.surface, self.bounds.origin());
    }

    fn hit_test(&self, point: Point) -> bool {
        self.bounds.contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Affine;
    use sediment_imaging::{NullCanvas, TransformOperator};
    use std::cell::Cell;
    use std::rc::Rc;

    fn unit_op() -> BoxedOperation {
        Box::new(
            LambdaOperation::new(Rect::new(0.0, 0.0, 10.0, 10.0), |_| {})
                .with_hit_test(|p| Rect::new(0.0, 0.0, 10.0, 10.0).contains(p)),
        )
    }

    #[test]
    fn dispose_runs_once_on_drop() {
        let disposed = Rc::new(Cell::new(0));
        let counter = disposed.clone();
        let op = LambdaOperation::new(Rect::ZERO, |_| {})
            .on_dispose(move || counter.set(counter.get() + 1));
        drop(op);
        assert_eq!(disposed.get(), 1);
    }

    #[test]
    fn nan_bounds_are_sanitized() {
        let op = LambdaOperation::new(Rect::new(f64::NAN, 0.0, 1.0, 1.0), |_| {});
        assert_eq!(op.bounds(), Rect::ZERO);
    }

    #[test]
    fn scoped_hit_test_maps_through_transform() {
        let op = ScopedOperation::new(
            vec![ScopeOp::Transform {
                matrix: Affine::translate((100.0, 0.0)),
                op: TransformOperator::Prepend,
            }],
            vec![unit_op()],
            Rect::new(100.0, 0.0, 110.0, 10.0),
        );
        assert!(op.hit_test(Point::new(105.0, 5.0)));
        assert!(!op.hit_test(Point::new(5.0, 5.0)));
    }

    #[test]
    fn singular_transform_is_never_hit() {
        let op = ScopedOperation::new(
            vec![ScopeOp::Transform {
                matrix: Affine::scale_non_uniform(0.0, 1.0),
                op: TransformOperator::Prepend,
            }],
            vec![unit_op()],
            Rect::ZERO,
        );
        assert!(!op.hit_test(Point::new(0.0, 5.0)));
    }

    #[test]
    fn set_and_append_hit_test_like_the_canvas_draws() {
        let scoped = |op| {
            ScopedOperation::new(
                vec![ScopeOp::Transform {
                    matrix: Affine::translate((100.0, 0.0)),
                    op: TransformOperator::Prepend,
                }],
                vec![Box::new(ScopedOperation::new(
                    vec![ScopeOp::Transform {
                        matrix: Affine::scale(2.0),
                        op,
                    }],
                    vec![unit_op()],
                    Rect::ZERO,
                )) as BoxedOperation],
                Rect::ZERO,
            )
        };
        // Prepend: translate(100) * scale(2) covers 100..120.
        let prepend = scoped(TransformOperator::Prepend);
        assert!(prepend.hit_test(Point::new(115.0, 15.0)));
        assert!(!prepend.hit_test(Point::new(15.0, 15.0)));
        // Append: scale(2) * translate(100) covers 200..220.
        let append = scoped(TransformOperator::Append);
        assert!(append.hit_test(Point::new(215.0, 15.0)));
        assert!(!append.hit_test(Point::new(115.0, 15.0)));
        // Set drops the outer translation and covers 0..20.
        let set = scoped(TransformOperator::Set);
        assert!(set.hit_test(Point::new(15.0, 15.0)));
        assert!(!set.hit_test(Point::new(115.0, 15.0)));
    }

    #[test]
    fn clip_rejects_points_outside() {
        let op = ScopedOperation::new(
            vec![ScopeOp::Clip {
                shape: ClipShape::Rect(Rect::new(0.0, 0.0, 5.0, 5.0)),
                op: ClipOperation::Intersect,
            }],
            vec![unit_op()],
            Rect::new(0.0, 0.0, 5.0, 5.0),
        );
        assert!(op.hit_test(Point::new(2.0, 2.0)));
        assert!(!op.hit_test(Point::new(7.0, 7.0)));
    }

    #[test]
    fn scoped_render_restores_depth() {
        let op = ScopedOperation::new(
            vec![ScopeOp::Opacity(0.5), ScopeOp::Save],
            vec![unit_op()],
            Rect::ZERO,
        );
        let mut canvas = NullCanvas::new(10, 10);
        op.render(&mut canvas);
        assert_eq!(canvas.state_depth(), 0);
    }
}
