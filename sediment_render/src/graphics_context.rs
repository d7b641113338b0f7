// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immediate-mode replay onto a retained tree.
//!
//! Items describe their drawing every time they render, exactly as they would
//! against a canvas. [`GraphicsContext2D`] matches each call against the node
//! at the same position of the current container: a node of the same kind is
//! updated in place, anything else is replaced, and nodes the replay did not
//! reach are disposed when their container is popped.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use kurbo::{Affine, Point, Rect, Size};
use peniko::{BlendMode, Brush, Color};
use sediment_imaging::{
    ClipOperation, FilterEffect, FormattedText, Geometry, ImageSource, Pen, TransformOperator,
    VideoSource,
};

use crate::error::RenderError;
use crate::node::{
    BackdropHandle, BoundaryTransform, DrawNode, GeometryClip, NodeKind, Scope, ShapeNode,
    TextNode,
};
use crate::tree::{NodeId, RenderTree};

/// Something that can describe its drawing to a [`GraphicsContext2D`].
pub trait Renderable {
    /// Replay every draw call of the item.
    fn render(&self, context: &mut GraphicsContext2D<'_>) -> Result<(), RenderError>;
}

/// Counters for one replay.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Nodes appended past the end of a container.
    pub created: usize,
    /// Nodes replaced by a node of another kind.
    pub replaced: usize,
    /// Nodes reused with new parameters.
    pub updated: usize,
    /// Nodes reused with identical parameters.
    pub unchanged: usize,
    /// Nodes freed, including descendants of replaced containers.
    pub disposed: usize,
}

impl ReplayStats {
    /// Returns `true` if the replay left the tree exactly as it was.
    pub fn is_unchanged(&self) -> bool {
        self.created == 0 && self.replaced == 0 && self.updated == 0 && self.disposed == 0
    }
}

type UntrackedHook<'t> = Box<dyn FnMut(NodeId, &NodeKind) + 't>;

/// Positional reconciler over a [`RenderTree`].
pub struct GraphicsContext2D<'t> {
    tree: &'t mut RenderTree,
    container: NodeId,
    index: usize,
    stack: Vec<(NodeId, usize)>,
    canvas_size: Size,
    stats: ReplayStats,
    on_untracked: Option<UntrackedHook<'t>>,
}

impl fmt::Debug for GraphicsContext2D<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsContext2D")
            .field("container", &self.container)
            .field("index", &self.index)
            .field("depth", &self.stack.len())
            .field("canvas_size", &self.canvas_size)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'t> GraphicsContext2D<'t> {
    /// Start a replay at the root of `tree`.
    ///
    /// `canvas_size` is the area covered by clears and backdrops.
    pub fn new(tree: &'t mut RenderTree, canvas_size: Size) -> Self {
        let container = tree.root();
        Self {
            tree,
            container,
            index: 0,
            stack: Vec::new(),
            canvas_size,
            stats: ReplayStats::default(),
            on_untracked: None,
        }
    }

    /// Call `hook` with every node right before the replay disposes it.
    pub fn on_untracked(mut self, hook: impl FnMut(NodeId, &NodeKind) + 't) -> Self {
        self.on_untracked = Some(Box::new(hook));
        self
    }

    /// Area covered by clears and backdrops.
    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    /// The tree being replayed onto.
    pub fn tree(&self) -> &RenderTree {
        self.tree
    }

    /// Number of scopes currently pushed.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The container receiving draw calls.
    pub fn current(&self) -> NodeId {
        self.container
    }

    /// Position of the next draw call within the current container.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Counters so far.
    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    fn candidate(&self) -> Option<NodeId> {
        self.tree.child_at(self.container, self.index)
    }

    fn place(&mut self, id: NodeId) {
        let result = match self.candidate() {
            Some(_) => self.tree.set_child(self.container, self.index, id).map(Some),
            None => self.tree.add_child(self.container, id).map(|()| None),
        };
        match result {
            Ok(Some(old)) => {
                self.stats.replaced += 1;
                self.untrack(old);
            }
            Ok(None) => self.stats.created += 1,
            Err(err) => log::error!("replay could not attach node {id:?}: {err}"),
        }
        self.tree.mark_changed(self.container);
    }

    fn untrack(&mut self, id: NodeId) {
        if let (Some(hook), Some(kind)) = (self.on_untracked.as_mut(), self.tree.kind(id)) {
            hook(id, kind);
        }
        self.stats.disposed += self.tree.dispose(id);
    }

    /// Record a draw node at the current position.
    pub fn draw_node(&mut self, node: DrawNode) {
        let reusable = self.candidate().filter(|&id| {
            self.tree
                .kind(id)
                .and_then(NodeKind::as_draw)
                .is_some_and(|existing| existing.same_kind(&node))
        });
        if let Some(id) = reusable {
            if self.tree.update(id, NodeKind::Draw(node)) {
                self.stats.updated += 1;
            } else {
                self.stats.unchanged += 1;
            }
        } else {
            let id = self.tree.insert(NodeKind::Draw(node));
            self.place(id);
        }
        self.index += 1;
    }

    fn canvas_bounds(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.canvas_size)
    }

    /// Clear the target, or fill it with `color`.
    pub fn clear(&mut self, color: Option<Color>) {
        let bounds = self.canvas_bounds();
        self.draw_node(DrawNode::Clear { color, bounds });
    }

    /// Draw a rectangle.
    pub fn draw_rectangle(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>) {
        self.draw_node(DrawNode::Rectangle(ShapeNode {
            rect,
            fill: fill.cloned(),
            pen: pen.cloned(),
        }));
    }

    /// Draw the ellipse inscribed in `rect`.
    pub fn draw_ellipse(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>) {
        self.draw_node(DrawNode::Ellipse(ShapeNode {
            rect,
            fill: fill.cloned(),
            pen: pen.cloned(),
        }));
    }

    /// Draw the current path of `geometry`.
    pub fn draw_geometry(
        &mut self,
        geometry: &Geometry,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) -> Result<(), RenderError> {
        self.draw_node(DrawNode::geometry(geometry, fill, pen)?);
        Ok(())
    }

    /// Draw shaped text.
    pub fn draw_text(&mut self, text: &FormattedText, fill: Option<&Brush>, pen: Option<&Pen>) {
        self.draw_node(DrawNode::Text(TextNode {
            text: text.clone(),
            fill: fill.cloned(),
            pen: pen.cloned(),
        }));
    }

    /// Draw an image at its natural size.
    pub fn draw_image(
        &mut self,
        source: &ImageSource,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) -> Result<(), RenderError> {
        self.draw_node(DrawNode::image(source, fill, pen)?);
        Ok(())
    }

    /// Draw frame `frame` of a video at its natural size.
    pub fn draw_video(
        &mut self,
        source: &VideoSource,
        frame: u64,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) -> Result<(), RenderError> {
        self.draw_node(DrawNode::video(source, frame, fill, pen)?);
        Ok(())
    }

    /// Draw the frame of a video shown at `time`.
    pub fn draw_video_at(
        &mut self,
        source: &VideoSource,
        time: Duration,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) -> Result<(), RenderError> {
        let frame = source.frame_at(time);
        self.draw_video(source, frame, fill, pen)
    }

    /// Replay a nested item inside its own group.
    ///
    /// Scopes the item leaves pushed are popped when it returns.
    pub fn draw_renderable(&mut self, item: &dyn Renderable) -> Result<(), RenderError> {
        let mut group = self.push();
        item.render(&mut group)
    }

    /// Capture everything drawn so far.
    ///
    /// The returned handle stays the same across replays while the snapshot
    /// keeps its position; pass it to [`draw_backdrop`](Self::draw_backdrop).
    pub fn snapshot(&mut self) -> BackdropHandle {
        let existing = self.candidate().and_then(|id| match self.tree.kind(id) {
            Some(NodeKind::Draw(DrawNode::SnapshotBackdrop(handle))) => Some(handle.clone()),
            _ => None,
        });
        let handle = existing.unwrap_or_default();
        self.draw_node(DrawNode::SnapshotBackdrop(handle.clone()));
        handle
    }

    /// Draw a backdrop captured by [`snapshot`](Self::snapshot).
    pub fn draw_backdrop(&mut self, handle: &BackdropHandle) {
        let bounds = self.canvas_bounds();
        self.draw_node(DrawNode::DrawBackdrop {
            handle: handle.clone(),
            bounds,
        });
    }

    /// Open a container with `scope` at the current position.
    ///
    /// Later draw calls go into the container until the guard drops. When the
    /// position held a container of another kind, its children move into the
    /// new container so they can still be reused.
    pub fn push_scope(&mut self, scope: Scope) -> PushedNode<'_, 't> {
        let depth = self.stack.len();
        let candidate = self.candidate();
        let reusable = candidate.filter(|&id| {
            self.tree
                .kind(id)
                .and_then(NodeKind::as_scope)
                .is_some_and(|existing| existing.same_kind(&scope))
        });
        let id = if let Some(id) = reusable {
            if self.tree.update(id, NodeKind::Container(scope)) {
                self.stats.updated += 1;
            } else {
                self.stats.unchanged += 1;
            }
            id
        } else {
            let id = self.tree.insert(NodeKind::Container(scope));
            if let Some(old) = candidate {
                if self.tree.kind(old).is_some_and(NodeKind::is_container) {
                    if let Err(err) = self.tree.bring_from(id, old) {
                        log::error!("replay could not adopt children of {old:?}: {err}");
                    }
                }
            }
            self.place(id);
            id
        };
        self.stack.push((self.container, self.index + 1));
        self.container = id;
        self.index = 0;
        PushedNode {
            context: self,
            depth,
        }
    }

    /// Open a plain group.
    pub fn push(&mut self) -> PushedNode<'_, 't> {
        self.push_scope(Scope::Group)
    }

    /// Open an isolated layer, optionally limited to `limit`.
    pub fn push_layer(&mut self, limit: Option<Rect>) -> PushedNode<'_, 't> {
        self.push_scope(Scope::Layer(limit))
    }

    /// Composite the scope's content with `mode`.
    pub fn push_blend_mode(&mut self, mode: BlendMode) -> PushedNode<'_, 't> {
        self.push_scope(Scope::BlendMode(mode))
    }

    /// Clip the scope's content to a rectangle.
    pub fn push_clip(&mut self, rect: Rect, op: ClipOperation) -> PushedNode<'_, 't> {
        self.push_scope(Scope::RectClip { rect, op })
    }

    /// Clip the scope's content to the current path of `geometry`.
    pub fn push_geometry_clip(
        &mut self,
        geometry: &Geometry,
        op: ClipOperation,
    ) -> Result<PushedNode<'_, 't>, RenderError> {
        let clip = GeometryClip::new(geometry, op)?;
        Ok(self.push_scope(Scope::GeometryClip(clip)))
    }

    /// Composite the scope's content with a constant opacity.
    pub fn push_opacity(&mut self, opacity: f32) -> PushedNode<'_, 't> {
        self.push_scope(Scope::Opacity(opacity))
    }

    /// Run the scope's content through `effect`.
    pub fn push_filter_effect(&mut self, effect: &FilterEffect) -> PushedNode<'_, 't> {
        self.push_scope(Scope::FilterEffect(effect.clone()))
    }

    /// Multiply the scope's content by the alpha of `brush` over `bounds`.
    pub fn push_opacity_mask(
        &mut self,
        brush: &Brush,
        bounds: Rect,
        invert: bool,
    ) -> PushedNode<'_, 't> {
        self.push_scope(Scope::OpacityMask {
            brush: brush.clone(),
            bounds,
            invert,
        })
    }

    /// Transform the scope's content.
    pub fn push_transform(&mut self, matrix: Affine, op: TransformOperator) -> PushedNode<'_, 't> {
        self.push_scope(Scope::Transform { matrix, op })
    }

    /// Place the scope's content by its combined bounds.
    pub fn push_boundary_transform(&mut self, boundary: BoundaryTransform) -> PushedNode<'_, 't> {
        self.push_scope(Scope::BoundaryTransform(BoundaryTransform {
            split: false,
            ..boundary
        }))
    }

    /// Place each piece of the scope's content by its own bounds.
    pub fn push_split_transform(&mut self, boundary: BoundaryTransform) -> PushedNode<'_, 't> {
        self.push_scope(Scope::BoundaryTransform(BoundaryTransform {
            split: true,
            ..boundary
        }))
    }

    fn truncate(&mut self) {
        let removed = self.tree.split_off_children(self.container, self.index);
        if removed.is_empty() {
            return;
        }
        self.tree.mark_changed(self.container);
        for id in removed {
            self.untrack(id);
        }
    }

    /// Close the innermost scope.
    ///
    /// Children the replay did not reach are disposed. Popping with nothing
    /// pushed does nothing.
    pub fn pop(&mut self) {
        let Some((parent, index)) = self.stack.pop() else {
            return;
        };
        self.truncate();
        if self.tree.has_changes(self.container) {
            self.tree.mark_changed(parent);
        }
        self.container = parent;
        self.index = index;
    }

    /// Pop until `depth` scopes remain.
    ///
    /// Fails without popping anything if fewer than `depth` are pushed.
    pub fn pop_to(&mut self, depth: usize) -> Result<(), RenderError> {
        if depth > self.stack.len() {
            return Err(RenderError::UnbalancedPop {
                requested: depth,
                depth: self.stack.len(),
            });
        }
        while self.stack.len() > depth {
            self.pop();
        }
        Ok(())
    }

    /// Go back to the start of the root without touching the tree.
    pub fn reset(&mut self) {
        self.container = self.tree.root();
        self.index = 0;
        self.stack.clear();
        self.stats = ReplayStats::default();
    }

    /// End the replay.
    ///
    /// Pops every open scope and disposes root children past the last draw
    /// call.
    pub fn finish(mut self) -> ReplayStats {
        while !self.stack.is_empty() {
            self.pop();
        }
        self.truncate();
        self.stats
    }
}

/// Guard for a pushed scope; pops back to [`saved_depth`](Self::saved_depth) on drop.
///
/// Derefs to the [`GraphicsContext2D`], so draw calls made through the guard
/// land inside the scope.
#[must_use = "the scope is popped as soon as the guard is dropped"]
pub struct PushedNode<'g, 't> {
    context: &'g mut GraphicsContext2D<'t>,
    depth: usize,
}

impl PushedNode<'_, '_> {
    /// Depth restored when the guard drops.
    pub fn saved_depth(&self) -> usize {
        self.depth
    }

    /// Pop now.
    pub fn pop(self) {}
}

impl Drop for PushedNode<'_, '_> {
    fn drop(&mut self) {
        if let Err(err) = self.context.pop_to(self.depth) {
            log::error!("scope guard could not pop: {err}");
        }
    }
}

impl<'t> Deref for PushedNode<'_, 't> {
    type Target = GraphicsContext2D<'t>;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl<'t> DerefMut for PushedNode<'_, 't> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl fmt::Debug for PushedNode<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushedNode")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
