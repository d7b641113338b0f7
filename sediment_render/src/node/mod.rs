// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render node kinds.
//!
//! A node is either a [`DrawNode`] leaf or a container holding a [`Scope`].
//! Both compare their parameters by value (sources by identity), which is what
//! the reconciler uses to decide whether a replayed draw call changed anything.

mod container;
mod draw;

pub use container::{
    AlignmentX, AlignmentY, BoundaryTransform, GeometryClip, RelativePoint, RelativeUnit, Scope,
};
pub use draw::{BackdropHandle, DrawNode, GeometryNode, ImageNode, ShapeNode, TextNode, VideoNode};

use kurbo::Rect;

use crate::context::RenderNodeContext;
use crate::operation::BoxedOperation;

/// What a render node does.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    /// A single draw call.
    Draw(DrawNode),
    /// A scope applied to the node's children.
    Container(Scope),
}

impl NodeKind {
    /// Returns `true` for containers.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container(_))
    }

    /// The draw parameters of a leaf.
    pub fn as_draw(&self) -> Option<&DrawNode> {
        match self {
            Self::Draw(draw) => Some(draw),
            Self::Container(_) => None,
        }
    }

    /// The scope of a container.
    pub fn as_scope(&self) -> Option<&Scope> {
        match self {
            Self::Draw(_) => None,
            Self::Container(scope) => Some(scope),
        }
    }

    /// Returns `true` if this node itself may be held in a render cache.
    ///
    /// Children of containers are checked separately.
    pub fn is_cacheable(&self) -> bool {
        match self {
            Self::Draw(draw) => draw.is_cacheable(),
            Self::Container(scope) => scope.is_cacheable(),
        }
    }

    /// Bounds of the node given the bounds of its children.
    pub(crate) fn bounds(&self, children: &[Rect]) -> Rect {
        match self {
            Self::Draw(draw) => draw.bounds(),
            Self::Container(scope) => scope.transform_bounds(children),
        }
    }

    /// Turn the children's operations into this node's operations.
    pub(crate) fn process(&self, context: &mut RenderNodeContext) -> Vec<BoxedOperation> {
        match self {
            Self::Draw(draw) => {
                if !draw.is_cacheable() {
                    context.set_render_cache_enabled(false);
                }
                draw.process()
            }
            Self::Container(scope) => {
                if !scope.is_cacheable() {
                    context.set_render_cache_enabled(false);
                }
                scope.process(context.take_input())
            }
        }
    }
}
