// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The persistent render node tree.
//!
//! Nodes live in a slot arena and are addressed by generational [`NodeId`]s.
//! Each node has exactly one parent; the tree owns every node it holds, and
//! [`RenderTree::dispose`] releases a node and its subtree exactly once.

use std::cell::Cell;

use kurbo::Rect;
use smallvec::SmallVec;

use crate::cache::RenderNodeCache;
use crate::error::RenderError;
use crate::node::{NodeKind, Scope};
use crate::operation::sanitize;

/// Identifier for a node in a [`RenderTree`].
///
/// A slot index plus a generation. Freed slots are reused with a bumped
/// generation, so a stale id never aliases a different live node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(u32, u32);

impl NodeId {
    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A node of the render tree.
#[derive(Debug)]
pub struct RenderNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    has_changes: bool,
    bounds: Cell<Option<Rect>>,
    cache: RenderNodeCache,
}

impl RenderNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            has_changes: true,
            bounds: Cell::new(None),
            cache: RenderNodeCache::default(),
        }
    }

    /// What the node draws or applies.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The owning container, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered children; always empty for draw nodes.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns `true` if the node changed since the cache last validated it.
    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Render cache state of the node.
    pub fn cache(&self) -> &RenderNodeCache {
        &self.cache
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<RenderNode>,
}

/// Arena of render nodes with a group container at the root.
#[derive(Debug)]
pub struct RenderTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    live: usize,
}

impl Default for RenderTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderTree {
    /// A tree holding only an empty root group.
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId(0, 1),
            live: 0,
        };
        tree.root = tree.insert(NodeKind::Container(Scope::Group));
        tree
    }

    /// The root container.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if only the root is alive.
    pub fn is_empty(&self) -> bool {
        self.live <= 1
    }

    /// Returns `true` if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// The node for `id`, if alive.
    pub fn get(&self, id: NodeId) -> Option<&RenderNode> {
        self.slots
            .get(id.idx())
            .filter(|slot| slot.generation == id.1)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        self.slots
            .get_mut(id.idx())
            .filter(|slot| slot.generation == id.1)
            .and_then(|slot| slot.node.as_mut())
    }

    /// What the node draws or applies.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(RenderNode::kind)
    }

    /// Children of `id`; empty for leaves and dead ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.get(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// Child of `parent` at `index`.
    pub fn child_at(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.children(parent).get(index).copied()
    }

    /// Render cache of `id`.
    pub fn cache(&self, id: NodeId) -> Option<&RenderNodeCache> {
        self.get(id).map(RenderNode::cache)
    }

    /// Mutable render cache of `id`.
    pub fn cache_mut(&mut self, id: NodeId) -> Option<&mut RenderNodeCache> {
        self.get_mut(id).map(|node| &mut node.cache)
    }

    /// Create a detached node.
    pub fn insert(&mut self, kind: NodeKind) -> NodeId {
        let node = RenderNode::new(kind);
        self.live += 1;
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            NodeId(idx, slot.generation)
        } else {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "more than u32::MAX live nodes is not supported"
            )]
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                node: Some(node),
            });
            NodeId(idx, 1)
        }
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<(), RenderError> {
        let Some(p) = self.get(parent) else {
            return Err(RenderError::InvalidArgument("parent is not alive"));
        };
        if !p.kind.is_container() {
            return Err(RenderError::InvalidArgument("draw nodes cannot have children"));
        }
        let Some(c) = self.get(child) else {
            return Err(RenderError::InvalidArgument("child is not alive"));
        };
        if c.parent.is_some() {
            return Err(RenderError::InvalidArgument("child already has a parent"));
        }
        let mut ancestor = Some(parent);
        while let Some(a) = ancestor {
            if a == child {
                return Err(RenderError::InvalidArgument("child is an ancestor of parent"));
            }
            ancestor = self.get(a).and_then(RenderNode::parent);
        }
        Ok(())
    }

    /// Append a detached node to the children of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), RenderError> {
        self.check_attach(parent, child)?;
        self.attach(parent, child);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        self.invalidate_bounds(parent);
        Ok(())
    }

    /// Put a detached node at `index` of `parent`, detaching the previous one.
    ///
    /// Returns the detached node, which the caller must dispose or reattach.
    pub fn set_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<NodeId, RenderError> {
        self.check_attach(parent, child)?;
        let Some(old) = self.child_at(parent, index) else {
            return Err(RenderError::InvalidArgument("child index out of range"));
        };
        self.attach(parent, child);
        if let Some(p) = self.get_mut(parent) {
            p.children[index] = child;
        }
        if let Some(o) = self.get_mut(old) {
            o.parent = None;
        }
        self.invalidate_bounds(parent);
        Ok(old)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Detach every child of `parent` from position `at` on.
    ///
    /// Returns the detached nodes in order.
    pub fn split_off_children(&mut self, parent: NodeId, at: usize) -> Vec<NodeId> {
        let Some(p) = self.get_mut(parent) else {
            return Vec::new();
        };
        if at >= p.children.len() {
            return Vec::new();
        }
        let detached = p.children.split_off(at);
        for id in &detached {
            if let Some(c) = self.get_mut(*id) {
                c.parent = None;
            }
        }
        self.invalidate_bounds(parent);
        detached
    }

    /// Move every child of `src` to the end of the children of `dst`.
    pub fn bring_from(&mut self, dst: NodeId, src: NodeId) -> Result<(), RenderError> {
        if dst == src {
            return Ok(());
        }
        match self.kind(dst) {
            Some(kind) if kind.is_container() => {}
            Some(_) => return Err(RenderError::InvalidArgument("draw nodes cannot have children")),
            None => return Err(RenderError::InvalidArgument("target is not alive")),
        }
        if self.is_ancestor(src, dst) {
            return Err(RenderError::InvalidArgument("target is inside the source"));
        }
        let moved = self.split_off_children(src, 0);
        for &id in &moved {
            self.attach(dst, id);
        }
        if let Some(d) = self.get_mut(dst) {
            d.children.extend(moved);
        }
        self.invalidate_bounds(dst);
        Ok(())
    }

    fn is_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        while let Some(parent) = self.get(id).and_then(RenderNode::parent) {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(RenderNode::parent) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(c) = self.get_mut(id) {
            c.parent = None;
        }
        self.invalidate_bounds(parent);
    }

    /// Release `id` and its whole subtree.
    ///
    /// Returns the number of nodes freed; disposing a dead id frees nothing.
    /// Disposing the root only releases its children.
    pub fn dispose(&mut self, id: NodeId) -> usize {
        if !self.is_alive(id) {
            return 0;
        }
        if id == self.root {
            return self
                .split_off_children(id, 0)
                .into_iter()
                .map(|child| self.dispose(child))
                .sum();
        }
        self.detach(id);
        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id.idx()) else {
                continue;
            };
            if slot.generation != id.1 {
                continue;
            }
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                self.free.push(id.0);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }

    /// Release every node except the root.
    pub fn clear(&mut self) -> usize {
        self.dispose(self.root)
    }

    /// Replace the node's kind if it differs, marking the node changed.
    ///
    /// Returns `true` if anything changed.
    pub fn update(&mut self, id: NodeId, kind: NodeKind) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };
        if node.kind == kind {
            return false;
        }
        node.kind = kind;
        self.mark_changed(id);
        true
    }

    /// Flag `id` as changed and drop the cached bounds along its ancestors.
    pub fn mark_changed(&mut self, id: NodeId) {
        if let Some(node) = self.get_mut(id) {
            node.has_changes = true;
        }
        self.invalidate_bounds(id);
    }

    /// Returns `true` if `id` changed since its flag was last taken.
    pub fn has_changes(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(RenderNode::has_changes)
    }

    /// Read and clear the change flag of `id`.
    pub fn take_has_changes(&mut self, id: NodeId) -> bool {
        self.get_mut(id)
            .is_some_and(|node| std::mem::replace(&mut node.has_changes, false))
    }

    fn invalidate_bounds(&self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        node.bounds.set(None);
        let mut current = node.parent;
        while let Some(parent) = current.and_then(|p| self.get(p)) {
            if parent.bounds.get().is_none() {
                break;
            }
            parent.bounds.set(None);
            current = parent.parent;
        }
    }

    /// Bounds of `id`, computed on demand and memoized until a change.
    ///
    /// A container's bounds are its scope applied to the union of its
    /// children's bounds; an empty container has zero bounds.
    pub fn bounds(&self, id: NodeId) -> Rect {
        let Some(node) = self.get(id) else {
            return Rect::ZERO;
        };
        if let Some(bounds) = node.bounds.get() {
            return bounds;
        }
        let children: SmallVec<[Rect; 8]> =
            node.children.iter().map(|&child| self.bounds(child)).collect();
        let bounds = sanitize(node.kind.bounds(&children));
        node.bounds.set(Some(bounds));
        bounds
    }
}
