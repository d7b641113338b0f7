// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sediment Imaging: the canvas interface consumed by Sediment render nodes.
//!
//! This crate defines the narrow surface that retained render nodes need from a
//! drawing backend, plus the small value types that flow through it.
//!
//! # Position in the stack
//!
//! - **Scene / layers**: items keyed by identity, replayed only when they
//!   report a change. See `sediment_scene`.
//! - **Render nodes**: the persistent node tree, the positional reconciler,
//!   operation pulls and render caches. See `sediment_render`.
//! - **Canvas interface (this crate)**: [`Canvas`] with a depth-based state
//!   stack, [`SurfaceFactory`] for offscreen targets, and the source handles
//!   ([`ImageSource`], [`VideoSource`], [`Geometry`]) that draw calls reference.
//! - **Backends**: concrete canvases. `sediment_imaging_ref` is a CPU reference
//!   implementation, [`NullCanvas`] draws nothing.
//!
//! # Scopes
//!
//! Every state change is pushed with [`Canvas::push_state`], which returns the
//! depth to restore. [`CanvasExt`] wraps this in RAII guards ([`PushedState`])
//! so that state is restored on every exit path:
//!
//! ```rust
//! use sediment_imaging::{Canvas, CanvasExt, NullCanvas, Rect};
//! use peniko::{Brush, Color};
//!
//! let mut canvas = NullCanvas::new(64, 64);
//! {
//!     let mut scoped = canvas.push_opacity(0.5);
//!     scoped.draw_rectangle(
//!         Rect::new(0.0, 0.0, 10.0, 10.0),
//!         Some(&Brush::Solid(Color::WHITE)),
//!         None,
//!     );
//! }
//! assert_eq!(canvas.state_depth(), 0);
//! ```
//!
//! # Resources
//!
//! Sources and surfaces are shared handles. Equality is identity, and the
//! backing storage is released deterministically when the last handle drops.
//! Sources can also be disposed explicitly; draw calls reject disposed sources.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod canvas;
mod device;
mod effect;
mod null;
mod paint;
mod source;
mod surface;

pub use canvas::{Canvas, CanvasExt, ClipShape, PushedState, ScopeOp};
pub use device::GraphicsDevice;
pub use effect::{FilterDesc, FilterEffect};
pub use null::NullCanvas;
pub use paint::{ClipOperation, Pen, TransformOperator};
pub use source::{Bitmap, FormattedText, Geometry, ImageSource, VideoDecoder, VideoSource};
pub use surface::{Backdrop, Surface, SurfaceFactory};

pub use kurbo::{Affine, BezPath, Point, Rect, Size, Stroke, Vec2};
pub use peniko::{BlendMode, Brush, Color, Compose, Fill as FillRule, ImageAlphaType, Mix};
