// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One z-level of items, each with its own render tree.

use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use hashbrown::hash_map::Entry as MapEntry;
use kurbo::{Point, Rect, Size};
use sediment_imaging::{Canvas, GraphicsDevice};
use sediment_render::{
    GraphicsContext2D, RenderNodeCacheContext, RenderNodeProcessor, RenderTree, Renderable,
};

use crate::Damage;

/// Identity of an item: the address of its shared allocation.
///
/// Entries hold a [`Weak`] to the item, which keeps the allocation (and so
/// the address) reserved for as long as the entry exists.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct ItemKey(usize);

impl ItemKey {
    fn of(item: &Rc<dyn Renderable>) -> Self {
        Self(Rc::as_ptr(item).cast::<()>().addr())
    }
}

struct Entry {
    item: Weak<dyn Renderable>,
    tree: RenderTree,
    dirty: bool,
    failed: bool,
    bounds: Option<Rect>,
}

impl Entry {
    fn new(item: &Rc<dyn Renderable>) -> Self {
        Self {
            item: Rc::downgrade(item),
            tree: RenderTree::new(),
            dirty: true,
            failed: false,
            bounds: None,
        }
    }

    fn add_bounds(&self, damage: &mut Damage) {
        if let Some(bounds) = self.bounds {
            damage.add(bounds);
        }
    }

    /// Replay the item into the tree.
    ///
    /// A failed replay keeps what it drew before failing, tracked like any
    /// other output, and leaves the entry dirty.
    fn replay(&mut self, item: &dyn Renderable, canvas_size: Size, damage: &mut Damage) {
        let mut ctx = GraphicsContext2D::new(&mut self.tree, canvas_size);
        let result = item.render(&mut ctx);
        let stats = ctx.finish();
        match result {
            Ok(()) => {
                log::trace!("item replayed: {stats:?}");
                self.dirty = false;
                self.failed = false;
            }
            Err(err) => {
                log::warn!("item failed to render, keeping it for retry: {err}");
                self.failed = true;
            }
        }

        let root = self.tree.root();
        let bounds = Some(self.tree.bounds(root)).filter(|b| b.area() > 0.0);
        if !stats.is_unchanged() || bounds != self.bounds {
            self.add_bounds(damage);
            if let Some(bounds) = bounds {
                damage.add(bounds);
            }
        }
        self.bounds = bounds;
    }
}

/// Items drawn at one z-index, back to front.
///
/// Each item owns a persistent [`RenderTree`]. An item is replayed when it is
/// first seen and again after [`invalidate`](Self::invalidate); otherwise its
/// tree is reused as is. Items missing from an update are disposed.
#[derive(Default)]
pub struct RenderLayer {
    entries: HashMap<ItemKey, Entry>,
    order: Vec<ItemKey>,
}

impl fmt::Debug for RenderLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderLayer")
            .field("items", &self.order.len())
            .field("dirty", &self.entries.values().filter(|e| e.dirty).count())
            .finish_non_exhaustive()
    }
}

impl RenderLayer {
    /// An empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the layer has no items.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` if `item` is part of the layer.
    pub fn contains(&self, item: &Rc<dyn Renderable>) -> bool {
        self.entries.contains_key(&ItemKey::of(item))
    }

    /// Whether `item` is waiting to be replayed, or `None` if unknown.
    pub fn is_dirty(&self, item: &Rc<dyn Renderable>) -> Option<bool> {
        self.entries.get(&ItemKey::of(item)).map(|e| e.dirty)
    }

    /// Whether the last replay of `item` failed, or `None` if unknown.
    ///
    /// A failed item keeps the nodes its replay reached before failing and is
    /// replayed again at every update until it succeeds.
    pub fn has_failed(&self, item: &Rc<dyn Renderable>) -> Option<bool> {
        self.entries.get(&ItemKey::of(item)).map(|e| e.failed)
    }

    /// Render tree of `item`.
    pub fn tree(&self, item: &Rc<dyn Renderable>) -> Option<&RenderTree> {
        self.entries.get(&ItemKey::of(item)).map(|e| &e.tree)
    }

    /// Render trees of every item, in no particular order.
    pub fn trees_mut(&mut self) -> impl Iterator<Item = &mut RenderTree> {
        self.entries.values_mut().map(|e| &mut e.tree)
    }

    /// Bring the layer in line with `items`.
    ///
    /// New items are added, items no longer listed are disposed, and dirty
    /// items are replayed with a context of `canvas_size`. An item listed
    /// twice is drawn once, at its first position.
    pub fn update(&mut self, items: &[Rc<dyn Renderable>], canvas_size: Size) -> Damage {
        let mut damage = Damage::default();
        let mut order = Vec::with_capacity(items.len());
        let mut positions: HashMap<ItemKey, usize> = HashMap::with_capacity(items.len());
        for item in items {
            let key = ItemKey::of(item);
            let MapEntry::Vacant(position) = positions.entry(key) else {
                log::debug!("item listed twice in one layer update");
                continue;
            };
            position.insert(order.len());
            if let MapEntry::Vacant(slot) = self.entries.entry(key) {
                slot.insert(Entry::new(item));
            }
            order.push(key);
        }

        // Dropped items are disposed; moved items repaint in their new
        // paint order.
        let previous = std::mem::replace(&mut self.order, order);
        for (old, key) in previous.iter().enumerate() {
            match positions.get(key) {
                None => {
                    if let Some(entry) = self.entries.remove(key) {
                        entry.add_bounds(&mut damage);
                    }
                }
                Some(&new) if new != old => {
                    if let Some(entry) = self.entries.get(key) {
                        entry.add_bounds(&mut damage);
                    }
                }
                Some(_) => {}
            }
        }

        for key in &self.order {
            let Some(entry) = self.entries.get_mut(key).filter(|e| e.dirty) else {
                continue;
            };
            if let Some(item) = entry.item.upgrade() {
                entry.replay(&*item, canvas_size, &mut damage);
            }
        }
        damage
    }

    /// Mark `item` for replay at the next update.
    ///
    /// Returns `false` if the item is not part of the layer.
    pub fn invalidate(&mut self, item: &Rc<dyn Renderable>) -> bool {
        match self.entries.get_mut(&ItemKey::of(item)) {
            Some(entry) => {
                entry.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Mark every item for replay.
    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.dirty = true;
        }
    }

    /// Dispose `item` now. Returns the area it covered.
    pub fn remove(&mut self, item: &Rc<dyn Renderable>) -> Damage {
        let key = ItemKey::of(item);
        let mut damage = Damage::default();
        if let Some(entry) = self.entries.remove(&key) {
            entry.add_bounds(&mut damage);
            self.order.retain(|k| *k != key);
        }
        damage
    }

    /// Draw every item, back to front, and cache what has become stable.
    ///
    /// Caches are validated before each item is pulled; afterwards `cache`
    /// decides which subtrees to rasterize with `device`.
    pub fn render(
        &mut self,
        canvas: &mut dyn Canvas,
        device: &GraphicsDevice,
        cache: &RenderNodeCacheContext,
    ) {
        let use_cache = cache.options().is_enabled;
        for key in &self.order {
            let Some(entry) = self.entries.get_mut(key) else {
                continue;
            };
            let tree = &mut entry.tree;
            let root = tree.root();
            cache.validate(tree, root);
            RenderNodeProcessor::new(tree, device, use_cache).render(canvas, root);
            cache.make_cache(tree, device, root);
        }
    }

    /// Topmost item under `point`.
    pub fn hit_test(&mut self, point: Point) -> Option<Rc<dyn Renderable>> {
        let device = GraphicsDevice::null();
        for key in self.order.iter().rev() {
            let Some(entry) = self.entries.get_mut(key) else {
                continue;
            };
            if !entry.bounds.is_some_and(|b| b.contains(point)) {
                continue;
            }
            let root = entry.tree.root();
            if RenderNodeProcessor::new(&mut entry.tree, &device, false).hit_test(root, point) {
                return entry.item.upgrade();
            }
        }
        None
    }

    /// Items and the bounds they covered at their last replay, back to front.
    ///
    /// Items that have never drawn anything are skipped.
    pub fn boundaries(&self) -> Vec<(Rc<dyn Renderable>, Rect)> {
        self.order
            .iter()
            .filter_map(|key| {
                let entry = self.entries.get(key)?;
                Some((entry.item.upgrade()?, entry.bounds?))
            })
            .collect()
    }

    /// Drop every render cache of the layer.
    pub fn clear_caches(&mut self) {
        for tree in self.trees_mut() {
            let root = tree.root();
            RenderNodeCacheContext::clear_cache(tree, root);
        }
    }

    /// Dispose every item. Returns the area they covered.
    pub fn dispose(&mut self) -> Damage {
        let mut damage = Damage::default();
        for key in self.order.drain(..) {
            if let Some(mut entry) = self.entries.remove(&key) {
                entry.add_bounds(&mut damage);
                let freed = entry.tree.clear();
                log::trace!("disposed {freed} nodes");
            }
        }
        self.entries.clear();
        damage
    }
}
