// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Explicitly managed graphics device handle.

use alloc::rc::Rc;
use core::fmt;

use crate::SurfaceFactory;

/// Handle to the backend that allocates offscreen surfaces.
///
/// A device is created once at startup, handed to whatever needs offscreen
/// targets and shut down once at teardown. A device without a factory (see
/// [`GraphicsDevice::null`]) never allocates, so render caches stay empty and
/// isolated rasterization reports unavailable surfaces.
#[derive(Clone, Default)]
pub struct GraphicsDevice {
    factory: Option<Rc<dyn SurfaceFactory>>,
}

impl GraphicsDevice {
    /// Create a device backed by `factory`.
    pub fn new(factory: impl SurfaceFactory + 'static) -> Self {
        Self {
            factory: Some(Rc::new(factory)),
        }
    }

    /// Create a device sharing an existing factory.
    pub fn from_shared(factory: Rc<dyn SurfaceFactory>) -> Self {
        Self {
            factory: Some(factory),
        }
    }

    /// A device with no backend.
    pub fn null() -> Self {
        Self { factory: None }
    }

    /// Returns `true` while a backend is attached.
    pub fn is_available(&self) -> bool {
        self.factory.is_some()
    }

    /// The surface factory, if a backend is attached.
    pub fn factory(&self) -> Option<&dyn SurfaceFactory> {
        self.factory.as_deref()
    }

    /// Detach the backend. Later allocations fail.
    ///
    /// Surfaces already handed out stay valid until their last handle drops.
    pub fn shutdown(&mut self) {
        if self.factory.take().is_some() {
            log::debug!("graphics device shut down");
        }
    }
}

impl fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("available", &self.is_available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Canvas, NullCanvas, Surface};
    use alloc::boxed::Box;

    struct Fixed;

    impl SurfaceFactory for Fixed {
        fn create_render_target(&self, width: u32, height: u32) -> Option<Surface> {
            (width > 0 && height > 0).then(|| Surface::new(width, height, ()))
        }

        fn create_canvas(&self, surface: &Surface, _clear: bool) -> Option<Box<dyn Canvas>> {
            Some(Box::new(NullCanvas::new(surface.width(), surface.height())))
        }
    }

    #[test]
    fn null_device_never_allocates() {
        let device = GraphicsDevice::null();
        assert!(!device.is_available());
        assert!(device.factory().is_none());
    }

    #[test]
    fn shutdown_detaches_factory() {
        let mut device = GraphicsDevice::new(Fixed);
        let surface = device
            .factory()
            .and_then(|f| f.create_render_target(2, 2))
            .unwrap();
        device.shutdown();
        assert!(!device.is_available());
        assert_eq!(surface.width(), 2);
    }
}
