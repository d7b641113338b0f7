// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface factory for the reference canvas.

use std::cell::Cell;

use sediment_imaging::{Canvas, Surface, SurfaceFactory};

use crate::{Pixmap, RefCanvas};

/// Allocates [`Pixmap`]-backed surfaces and opens [`RefCanvas`]es on them.
///
/// Requests with an empty size or a side above the configured maximum are
/// refused, which lets tests exercise allocation failures.
#[derive(Debug)]
pub struct RefSurfaceFactory {
    max_dimension: u32,
    allocations: Cell<usize>,
}

impl RefSurfaceFactory {
    /// Default largest side accepted by [`RefSurfaceFactory::new`].
    pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

    /// A factory accepting sides up to [`Self::DEFAULT_MAX_DIMENSION`].
    pub fn new() -> Self {
        Self::with_max_dimension(Self::DEFAULT_MAX_DIMENSION)
    }

    /// A factory accepting sides up to `max_dimension`.
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            allocations: Cell::new(0),
        }
    }

    /// Number of surfaces handed out so far.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }
}

impl Default for RefSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceFactory for RefSurfaceFactory {
    fn create_render_target(&self, width: u32, height: u32) -> Option<Surface> {
        if width == 0 || height == 0 || width > self.max_dimension || height > self.max_dimension
        {
            log::debug!("refusing {width}x{height} render target");
            return None;
        }
        self.allocations.set(self.allocations.get() + 1);
        Some(Surface::new(width, height, Pixmap::new(width, height)))
    }

    fn create_canvas(&self, surface: &Surface, clear: bool) -> Option<Box<dyn Canvas>> {
        let canvas = RefCanvas::for_surface(surface.clone(), clear)?;
        Some(Box::new(canvas))
    }
}
