// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Offscreen surfaces, backdrops and the factory that allocates them.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::any::Any;
use core::cell::{Ref, RefCell, RefMut};
use core::fmt;

use kurbo::Size;

use crate::Canvas;

struct SurfaceInner {
    width: u32,
    height: u32,
    data: RefCell<Box<dyn Any>>,
}

/// A reference-counted handle to backend pixel storage.
///
/// Clones share the storage. The backend payload is dropped when the last
/// handle goes away, which is where backends release their resources.
#[derive(Clone)]
pub struct Surface(Rc<SurfaceInner>);

impl Surface {
    /// Wrap a backend payload of the given pixel size.
    pub fn new(width: u32, height: u32, data: impl Any) -> Self {
        Self(Rc::new(SurfaceInner {
            width,
            height,
            data: RefCell::new(Box::new(data)),
        }))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.0.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.0.height
    }

    /// Size in pixels.
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.0.width), f64::from(self.0.height))
    }

    /// Borrow the backend payload if it has type `T`.
    pub fn data<T: Any>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.0.data.borrow(), |d| (**d).downcast_ref::<T>()).ok()
    }

    /// Mutably borrow the backend payload if it has type `T`.
    pub fn data_mut<T: Any>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.0.data.borrow_mut(), |d| (**d).downcast_mut::<T>()).ok()
    }

    /// Returns `true` if both handles share storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this storage.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl PartialEq for Surface {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.0.width)
            .field("height", &self.0.height)
            .finish_non_exhaustive()
    }
}

/// Pixels captured from a canvas, to be drawn back later in the same frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Backdrop {
    surface: Surface,
}

impl Backdrop {
    /// Wrap a captured surface. The surface covers the canvas in device space.
    pub fn new(surface: Surface) -> Self {
        Self { surface }
    }

    /// The captured pixels.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }
}

/// Allocates offscreen render targets and canvases that draw into them.
pub trait SurfaceFactory {
    /// Allocate a `width` x `height` target.
    ///
    /// Returns `None` for empty sizes or when the backend refuses the allocation.
    fn create_render_target(&self, width: u32, height: u32) -> Option<Surface>;

    /// Open a canvas drawing into `surface`, optionally clearing it first.
    ///
    /// Returns `None` if the surface belongs to another backend.
    fn create_canvas(&self, surface: &Surface, clear: bool) -> Option<Box<dyn Canvas>>;
}
