// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sediment Render: retained render nodes with positional reconciliation.
//!
//! Items draw in immediate mode through a [`GraphicsContext2D`], which folds
//! each replay into a persistent [`RenderTree`]: nodes at the same position and
//! of the same kind are reused, changed parameters mark nodes dirty, and
//! anything the replay no longer reaches is disposed.
//!
//! Drawing is a separate, bottom-up pass. A [`RenderNodeProcessor`] pulls a
//! subtree into a flat list of [`Operation`]s, each container wrapping the
//! operations of its children in its own scope. Operations render onto any
//! [`sediment_imaging::Canvas`] and are dropped afterwards.
//!
//! Subtrees that stay unchanged for a few frames can be rasterized into
//! surfaces by a [`RenderNodeCacheContext`]; later pulls draw those surfaces
//! instead of walking the subtree.
//!
//! ```rust
//! use kurbo::{Rect, Size};
//! use peniko::{Brush, Color};
//! use sediment_imaging::{GraphicsDevice, NullCanvas};
//! use sediment_render::{GraphicsContext2D, RenderNodeProcessor, RenderTree};
//!
//! let mut tree = RenderTree::new();
//! let red = Brush::Solid(Color::from_rgba8(255, 0, 0, 255));
//!
//! for _ in 0..2 {
//!     let mut ctx = GraphicsContext2D::new(&mut tree, Size::new(64.0, 64.0));
//!     {
//!         let mut faded = ctx.push_opacity(0.5);
//!         faded.draw_rectangle(Rect::new(8.0, 8.0, 24.0, 24.0), Some(&red), None);
//!     }
//!     let stats = ctx.finish();
//!     // The second replay reuses both nodes.
//!     assert!(stats.created == 2 || stats.is_unchanged());
//! }
//!
//! let device = GraphicsDevice::null();
//! let root = tree.root();
//! let mut canvas = NullCanvas::new(64, 64);
//! RenderNodeProcessor::new(&mut tree, &device, false).render(&mut canvas, root);
//! assert_eq!(tree.bounds(root), Rect::new(8.0, 8.0, 24.0, 24.0));
//! ```

mod cache;
mod context;
mod error;
mod graphics_context;
mod node;
mod operation;
mod processor;
mod tree;

pub use cache::{
    CacheState, RenderCacheOptions, RenderCacheRules, RenderNodeCache, RenderNodeCacheContext,
};
pub use context::RenderNodeContext;
pub use error::RenderError;
pub use graphics_context::{GraphicsContext2D, PushedNode, Renderable, ReplayStats};
pub use node::{
    AlignmentX, AlignmentY, BackdropHandle, BoundaryTransform, DrawNode, GeometryClip,
    GeometryNode, ImageNode, NodeKind, RelativePoint, RelativeUnit, Scope, ShapeNode, TextNode,
    VideoNode,
};
pub use operation::{
    BoxedOperation, CachedSurfaceOperation, LambdaOperation, Operation, ScopedOperation,
    union_bounds,
};
pub use processor::{RenderNodeProcessor, rasterize_concat, rasterize_operations};
pub use tree::{NodeId, RenderNode, RenderTree};
