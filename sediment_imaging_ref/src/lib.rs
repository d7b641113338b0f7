// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sediment Imaging Ref: a reference CPU canvas.
//!
//! [`RefCanvas`] implements [`sediment_imaging::Canvas`] on top of a
//! premultiplied floating point [`Pixmap`]. It is deliberately simple:
//!
//! - Coverage is point-sampled at pixel centers, without anti-aliasing.
//! - Only solid brushes paint; other brushes are recorded and skipped.
//! - Isolating scopes render into offscreen pixmaps and are composited when
//!   popped, applying opacity, separable blend modes, filters and masks.
//! - Every call is recorded as an [`Event`], which makes the canvas usable as
//!   a test oracle for both call sequences and pixels.
//!
//! [`RefSurfaceFactory`] allocates pixmap surfaces and can be configured to
//! refuse large allocations.
//!
//! ```rust
//! use sediment_imaging::{Canvas, Rect};
//! use sediment_imaging_ref::RefCanvas;
//! use peniko::{Brush, Color};
//!
//! let mut canvas = RefCanvas::new(4, 4);
//! canvas.draw_rectangle(
//!     Rect::new(0.0, 0.0, 2.0, 2.0),
//!     Some(&Brush::Solid(Color::from_rgba8(255, 0, 0, 255))),
//!     None,
//! );
//! assert_eq!(canvas.pixmap().pixel_rgba8(1, 1), [255, 0, 0, 255]);
//! assert_eq!(canvas.pixmap().pixel_rgba8(3, 3), [0, 0, 0, 0]);
//! ```

mod canvas;
mod factory;
mod filter;
mod pixmap;
mod raster;

pub use canvas::{Event, RefCanvas};
pub use factory::RefSurfaceFactory;
pub use pixmap::{Pixmap, Premul};
