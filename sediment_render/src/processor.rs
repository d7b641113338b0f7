// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bottom-up pulls over a [`RenderTree`].

use kurbo::{Affine, Point, Rect};
use sediment_imaging::{
    Canvas, CanvasExt, GraphicsDevice, Surface, SurfaceFactory, TransformOperator,
};
use smallvec::SmallVec;

use crate::context::RenderNodeContext;
use crate::error::RenderError;
use crate::operation::{BoxedOperation, union_bounds};
use crate::tree::{NodeId, RenderTree};

/// Turns a subtree into a flat list of operations.
///
/// A pull visits children first and hands their concatenated operations to
/// the parent. With `use_render_cache`, a cached node answers with its stored
/// surfaces and its subtree is skipped.
#[derive(Debug)]
pub struct RenderNodeProcessor<'a> {
    tree: &'a mut RenderTree,
    device: &'a GraphicsDevice,
    use_render_cache: bool,
}

impl<'a> RenderNodeProcessor<'a> {
    /// A processor over `tree`, rasterizing with `device`.
    pub fn new(
        tree: &'a mut RenderTree,
        device: &'a GraphicsDevice,
        use_render_cache: bool,
    ) -> Self {
        Self {
            tree,
            device,
            use_render_cache,
        }
    }

    /// Operations of the subtree at `id`, updating render counts.
    pub fn pull(&mut self, id: NodeId) -> Vec<BoxedOperation> {
        self.pull_node(id, true)
    }

    /// Operations of the subtree at `id` without touching render counts.
    pub fn pull_uncounted(&mut self, id: NodeId) -> Vec<BoxedOperation> {
        self.pull_node(id, false)
    }

    fn pull_node(&mut self, id: NodeId, count: bool) -> Vec<BoxedOperation> {
        let Some(node) = self.tree.get(id) else {
            return Vec::new();
        };
        if self.use_render_cache && node.cache().is_cached() {
            return node.cache().cached_operations();
        }
        let children: SmallVec<[NodeId; 8]> = node.children().into();
        let mut input = Vec::new();
        for child in children {
            input.extend(self.pull_node(child, count));
        }
        let mut context = RenderNodeContext::new(input);
        let Some(node) = self.tree.get(id) else {
            return Vec::new();
        };
        let output = node.kind().process(&mut context);
        if count {
            if let Some(cache) = self.tree.cache_mut(id) {
                if context.is_render_cache_enabled() {
                    cache.increment_render_count();
                } else {
                    cache.report_render_count(0);
                }
            }
        }
        output
    }

    /// Pull the subtree at `id` and draw it onto `canvas`.
    ///
    /// The operations are dropped once drawn.
    pub fn render(&mut self, canvas: &mut dyn Canvas, id: NodeId) {
        for op in self.pull(id) {
            op.render(canvas);
        }
    }

    /// Rasterize each operation of the subtree at `id` into its own surface.
    pub fn rasterize(&mut self, id: NodeId) -> Result<Vec<(Surface, Rect)>, RenderError> {
        let ops = self.pull_uncounted(id);
        rasterize_operations(self.device, &ops)
    }

    /// Rasterize the whole subtree at `id` into one surface.
    pub fn rasterize_and_concat(&mut self, id: NodeId) -> Result<(Surface, Rect), RenderError> {
        let ops = self.pull_uncounted(id);
        rasterize_concat(self.device, &ops)
    }

    /// Returns `true` if `point` hits the subtree at `id`.
    ///
    /// Operations are tested topmost first.
    pub fn hit_test(&mut self, id: NodeId, point: Point) -> bool {
        self.pull_uncounted(id)
            .iter()
            .rev()
            .any(|op| op.hit_test(point))
    }
}

/// Rasterize each operation into its own surface.
///
/// Operations without area are skipped.
pub fn rasterize_operations(
    device: &GraphicsDevice,
    ops: &[BoxedOperation],
) -> Result<Vec<(Surface, Rect)>, RenderError> {
    ops.iter()
        .filter(|op| op.bounds().area() > 0.0)
        .map(|op| rasterize_into(device, op.bounds(), std::slice::from_ref(op)))
        .collect()
}

/// Rasterize all operations, in order, into one surface covering their union.
pub fn rasterize_concat(
    device: &GraphicsDevice,
    ops: &[BoxedOperation],
) -> Result<(Surface, Rect), RenderError> {
    let bounds = union_bounds(ops)
        .filter(|b| b.area() > 0.0)
        .ok_or(RenderError::InvalidArgument("nothing to rasterize"))?;
    rasterize_into(device, bounds, ops)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "bounds are expanded to whole pixels; oversize requests saturate and are refused"
)]
fn rasterize_into(
    device: &GraphicsDevice,
    bounds: Rect,
    ops: &[BoxedOperation],
) -> Result<(Surface, Rect), RenderError> {
    let bounds = bounds.abs().expand();
    let (width, height) = (bounds.width() as u32, bounds.height() as u32);
    let unavailable = RenderError::SurfaceUnavailable { width, height };
    let factory: &dyn SurfaceFactory = device.factory().ok_or(unavailable.clone())?;
    let surface = factory
        .create_render_target(width, height)
        .ok_or(unavailable.clone())?;
    let mut canvas = factory
        .create_canvas(&surface, true)
        .ok_or(unavailable)?;
    {
        let mut shifted = canvas.push_transform(
            Affine::translate(-bounds.origin().to_vec2()),
            TransformOperator::Set,
        );
        for op in ops {
            op.render(&mut *shifted);
        }
    }
    drop(canvas);
    Ok((surface, bounds))
}
