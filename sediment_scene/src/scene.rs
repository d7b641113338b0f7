// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::BTreeMap;
use std::rc::Rc;

use kurbo::{Point, Rect, Size};
use sediment_imaging::{Canvas, GraphicsDevice};
use sediment_render::{RenderCacheOptions, RenderNodeCacheContext, Renderable};

use crate::{Damage, RenderLayer};

/// Layers of items keyed by z-index, drawn in ascending order.
///
/// The scene owns the [`GraphicsDevice`] used for render caches. A scene
/// built on [`GraphicsDevice::null`] renders normally but never caches.
#[derive(Debug)]
pub struct RenderScene {
    layers: BTreeMap<i32, RenderLayer>,
    device: GraphicsDevice,
    cache: RenderNodeCacheContext,
    size: Size,
}

impl RenderScene {
    /// An empty scene of `size`, caching with the default options.
    pub fn new(device: GraphicsDevice, size: Size) -> Self {
        Self::with_cache_options(device, size, RenderCacheOptions::DEFAULT)
    }

    /// An empty scene of `size`, caching with `options`.
    pub fn with_cache_options(
        device: GraphicsDevice,
        size: Size,
        options: RenderCacheOptions,
    ) -> Self {
        Self {
            layers: BTreeMap::new(),
            device,
            cache: RenderNodeCacheContext::new(options),
            size,
        }
    }

    /// Canvas size handed to items when they replay.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Resize the scene. Every item replays at its next update.
    pub fn set_size(&mut self, size: Size) {
        if size == self.size {
            return;
        }
        self.size = size;
        for layer in self.layers.values_mut() {
            layer.invalidate_all();
        }
    }

    /// Device used to rasterize caches.
    pub fn device(&self) -> &GraphicsDevice {
        &self.device
    }

    /// Release the device. Existing caches are dropped and no new ones are made.
    pub fn shutdown_device(&mut self) {
        self.clear_caches();
        self.device.shutdown();
    }

    /// Layer at `z`, if any.
    pub fn layer(&self, z: i32) -> Option<&RenderLayer> {
        self.layers.get(&z)
    }

    /// Z-indices in drawing order.
    pub fn z_indices(&self) -> impl Iterator<Item = i32> + '_ {
        self.layers.keys().copied()
    }

    /// Bring the layer at `z` in line with `items`, creating it if needed.
    ///
    /// See [`RenderLayer::update`].
    pub fn update(&mut self, z: i32, items: &[Rc<dyn Renderable>]) -> Damage {
        let size = self.size;
        self.layers.entry(z).or_default().update(items, size)
    }

    /// Mark `item` for replay in every layer holding it.
    ///
    /// Returns `false` if no layer holds the item.
    pub fn invalidate(&mut self, item: &Rc<dyn Renderable>) -> bool {
        let mut found = false;
        for layer in self.layers.values_mut() {
            found |= layer.invalidate(item);
        }
        found
    }

    /// Dispose `item` in every layer holding it.
    pub fn remove(&mut self, item: &Rc<dyn Renderable>) -> Damage {
        let mut damage = Damage::default();
        for layer in self.layers.values_mut() {
            damage.merge(layer.remove(item));
        }
        damage
    }

    /// Dispose the layer at `z` and everything in it.
    pub fn remove_layer(&mut self, z: i32) -> Damage {
        self.layers
            .remove(&z)
            .map(|mut layer| layer.dispose())
            .unwrap_or_default()
    }

    /// Clear `canvas` and draw every layer, lowest z first.
    pub fn render(&mut self, canvas: &mut dyn Canvas) {
        canvas.clear(None);
        for layer in self.layers.values_mut() {
            layer.render(canvas, &self.device, &self.cache);
        }
    }

    /// Topmost item under `point`, searching the highest z first.
    pub fn hit_test(&mut self, point: Point) -> Option<Rc<dyn Renderable>> {
        self.layers
            .values_mut()
            .rev()
            .find_map(|layer| layer.hit_test(point))
    }

    /// Every item with its bounds, in drawing order.
    pub fn boundaries(&self) -> Vec<(Rc<dyn Renderable>, Rect)> {
        self.layers
            .values()
            .flat_map(RenderLayer::boundaries)
            .collect()
    }

    /// Current cache options.
    pub fn cache_options(&self) -> &RenderCacheOptions {
        self.cache.options()
    }

    /// Replace the cache options, dropping every existing cache.
    pub fn set_cache_options(&mut self, options: RenderCacheOptions) {
        self.cache.set_options(
            options,
            self.layers.values_mut().flat_map(|layer| layer.trees_mut()),
        );
    }

    /// Drop every render cache.
    pub fn clear_caches(&mut self) {
        for layer in self.layers.values_mut() {
            layer.clear_caches();
        }
    }

    /// Dispose every layer. The scene stays usable.
    pub fn dispose(&mut self) -> Damage {
        let mut damage = Damage::default();
        for (_, mut layer) in std::mem::take(&mut self.layers) {
            damage.merge(layer.dispose());
        }
        damage
    }
}
