// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use sediment_imaging::GraphicsDevice;
use smallvec::SmallVec;

use super::RenderCacheOptions;
use crate::processor::{RenderNodeProcessor, rasterize_operations};
use crate::tree::{NodeId, RenderTree};

type Children = SmallVec<[NodeId; 8]>;

/// Decides when nodes are cached and keeps caches consistent with the tree.
///
/// A frame runs [`validate`](Self::validate) before pulling and
/// [`make_cache`](Self::make_cache) after the pulled operations are drawn.
#[derive(Clone, Debug, Default)]
pub struct RenderNodeCacheContext {
    options: RenderCacheOptions,
}

impl RenderNodeCacheContext {
    /// A context using `options`.
    pub fn new(options: RenderCacheOptions) -> Self {
        Self { options }
    }

    /// Current options.
    pub fn options(&self) -> &RenderCacheOptions {
        &self.options
    }

    /// Replace the options and clear every cache of `trees`.
    pub fn set_options<'t>(
        &mut self,
        options: RenderCacheOptions,
        trees: impl IntoIterator<Item = &'t mut RenderTree>,
    ) {
        self.options = options;
        for tree in trees {
            let root = tree.root();
            Self::clear_cache(tree, root);
        }
    }

    /// Consume change flags under `id` and invalidate affected caches.
    ///
    /// A node's cache is invalidated when the node or any descendant changed,
    /// or when its children differ from the ones captured last time. Returns
    /// `true` if the subtree changed.
    pub fn validate(&self, tree: &mut RenderTree, id: NodeId) -> bool {
        let Some(node) = tree.get(id) else {
            return false;
        };
        let is_container = node.kind().is_container();
        let children: Children = node.children().into();
        let mut changed = tree.take_has_changes(id);
        for &child in &children {
            if self.validate(tree, child) {
                changed = true;
            }
        }
        let Some(cache) = tree.cache_mut(id) else {
            return changed;
        };
        if is_container && !cache.same_children(&children) {
            changed = true;
        }
        if changed {
            cache.invalidate();
        }
        if is_container {
            cache.capture_children(&children);
        }
        changed
    }

    /// Returns `true` if `id` itself may be cached now.
    ///
    /// The node must be cacheable, have been pulled at least
    /// `min_render_count` times in a row, and, for containers, still have the
    /// children captured at the last validation.
    pub fn can_cache(&self, tree: &RenderTree, id: NodeId) -> bool {
        let Some(node) = tree.get(id) else {
            return false;
        };
        node.kind().is_cacheable()
            && node.cache().render_count() >= self.options.min_render_count
            && (!node.kind().is_container() || node.cache().same_children(node.children()))
    }

    /// Returns `true` if `id` and every descendant may be cached.
    pub fn can_cache_recursive(&self, tree: &RenderTree, id: NodeId) -> bool {
        self.can_cache(tree, id) && self.can_cache_recursive_children_only(tree, id)
    }

    /// Returns `true` if every descendant of `id` may be cached.
    pub fn can_cache_recursive_children_only(&self, tree: &RenderTree, id: NodeId) -> bool {
        tree.children(id)
            .iter()
            .all(|&child| self.can_cache_recursive(tree, child))
    }

    /// Cache the largest eligible subtrees under `id`.
    ///
    /// Does nothing when caching is disabled or the device cannot allocate
    /// surfaces. A subtree that is not eligible as a whole is searched for
    /// eligible descendants instead.
    pub fn make_cache(&self, tree: &mut RenderTree, device: &GraphicsDevice, id: NodeId) {
        if !self.options.is_enabled || !device.is_available() {
            return;
        }
        let Some(node) = tree.get(id) else {
            return;
        };
        if node.cache().is_cached() {
            return;
        }
        if self.can_cache_recursive(tree, id) && self.create_default_cache(tree, device, id) {
            return;
        }
        let children: Children = tree.children(id).into();
        for child in children {
            self.make_cache(tree, device, child);
        }
    }

    /// Rasterize `id` into its cache if its bounds satisfy the rules.
    ///
    /// Returns `true` if a cache was stored. Failures are logged and leave the
    /// node uncached.
    pub fn create_default_cache(
        &self,
        tree: &mut RenderTree,
        device: &GraphicsDevice,
        id: NodeId,
    ) -> bool {
        let bounds = tree.bounds(id);
        if !self.options.rules.matches(bounds) {
            log::trace!("bounds {bounds:?} outside cache rules");
            return false;
        }
        let ops = RenderNodeProcessor::new(tree, device, true).pull_uncounted(id);
        match rasterize_operations(device, &ops) {
            Ok(entries) => {
                drop(ops);
                if let Some(cache) = tree.cache_mut(id) {
                    log::debug!("cached node {id:?} into {} surfaces", entries.len());
                    cache.store(entries);
                    true
                } else {
                    false
                }
            }
            Err(err) => {
                log::warn!("could not cache node {id:?}: {err}");
                false
            }
        }
    }

    /// Invalidate the caches of `id` and all its descendants.
    pub fn clear_cache(tree: &mut RenderTree, id: NodeId) {
        let children: Children = tree.children(id).into();
        if let Some(cache) = tree.cache_mut(id) {
            cache.invalidate();
        }
        for child in children {
            Self::clear_cache(tree, child);
        }
    }
}
