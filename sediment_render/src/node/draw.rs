// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leaf nodes: one draw call each.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use kurbo::{BezPath, Ellipse, Point, Rect, Shape, StrokeOpts};
use peniko::{Brush, Color, Fill as FillRule};
use sediment_imaging::{Backdrop, Canvas, FormattedText, Geometry, ImageSource, Pen, VideoSource};

use crate::error::RenderError;
use crate::operation::{BoxedOperation, LambdaOperation, Operation, sanitize};

const HIT_TOLERANCE: f64 = 0.1;

/// Shared slot that a snapshot fills and a backdrop draw reads.
///
/// Handles compare by identity. The reconciler hands the same handle back on
/// every replay as long as the snapshot stays at the same position.
#[derive(Clone, Default)]
pub struct BackdropHandle(Rc<RefCell<Option<Backdrop>>>);

impl BackdropHandle {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured backdrop, if the snapshot has rendered this frame.
    pub fn get(&self) -> Option<Backdrop> {
        self.0.borrow().clone()
    }

    fn set(&self, backdrop: Option<Backdrop>) {
        *self.0.borrow_mut() = backdrop;
    }
}

impl PartialEq for BackdropHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for BackdropHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackdropHandle")
            .field("captured", &self.0.borrow().is_some())
            .finish()
    }
}

/// Rectangle or ellipse parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeNode {
    /// Bounding rectangle of the shape.
    pub rect: Rect,
    /// Interior brush.
    pub fill: Option<Brush>,
    /// Outline pen.
    pub pen: Option<Pen>,
}

/// A path drawn from a [`Geometry`] handle.
///
/// The path is snapshotted when the node is built; equality uses the handle
/// identity and its version instead of comparing path contents.
#[derive(Clone, Debug)]
pub struct GeometryNode {
    /// Source handle.
    pub geometry: Geometry,
    /// Version of `geometry` when `path` was captured.
    pub version: u64,
    /// Snapshot of the path.
    pub path: Rc<BezPath>,
    /// Snapshot of the fill rule.
    pub fill_rule: FillRule,
    /// Interior brush.
    pub fill: Option<Brush>,
    /// Outline pen.
    pub pen: Option<Pen>,
}

impl PartialEq for GeometryNode {
    fn eq(&self, other: &Self) -> bool {
        self.geometry == other.geometry
            && self.version == other.version
            && self.fill_rule == other.fill_rule
            && self.fill == other.fill
            && self.pen == other.pen
    }
}

/// Shaped text.
#[derive(Clone, Debug, PartialEq)]
pub struct TextNode {
    /// Text and its measured box.
    pub text: FormattedText,
    /// Glyph brush.
    pub fill: Option<Brush>,
    /// Glyph outline pen.
    pub pen: Option<Pen>,
}

/// A still image drawn at its natural size.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageNode {
    /// Image handle.
    pub source: ImageSource,
    /// Brush painted under the image.
    pub fill: Option<Brush>,
    /// Pen stroked around the image.
    pub pen: Option<Pen>,
}

/// One frame of a video drawn at its natural size.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoNode {
    /// Video handle.
    pub source: VideoSource,
    /// Frame index.
    pub frame: u64,
    /// Brush painted under the frame.
    pub fill: Option<Brush>,
    /// Pen stroked around the frame.
    pub pen: Option<Pen>,
}

/// A leaf of the render tree.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawNode {
    /// Clear the target, or fill it with a color.
    Clear {
        /// Fill color; `None` clears to transparent.
        color: Option<Color>,
        /// Area of the target, used as bounds.
        bounds: Rect,
    },
    /// Axis-aligned rectangle.
    Rectangle(ShapeNode),
    /// Ellipse inscribed in a rectangle.
    Ellipse(ShapeNode),
    /// Path.
    Geometry(GeometryNode),
    /// Text.
    Text(TextNode),
    /// Still image.
    Image(ImageNode),
    /// Video frame.
    Video(VideoNode),
    /// Capture what has been drawn so far into a [`BackdropHandle`].
    SnapshotBackdrop(BackdropHandle),
    /// Draw a previously captured backdrop.
    DrawBackdrop {
        /// Slot filled by the matching snapshot.
        handle: BackdropHandle,
        /// Area of the target, used as bounds.
        bounds: Rect,
    },
}

impl DrawNode {
    /// Path node for the current contents of `geometry`.
    pub fn geometry(
        geometry: &Geometry,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) -> Result<Self, RenderError> {
        if geometry.is_disposed() {
            return Err(RenderError::InvalidArgument("geometry has been disposed"));
        }
        Ok(Self::Geometry(GeometryNode {
            geometry: geometry.clone(),
            version: geometry.version(),
            path: geometry.path(),
            fill_rule: geometry.fill_rule(),
            fill: fill.cloned(),
            pen: pen.cloned(),
        }))
    }

    /// Image node, rejecting disposed sources.
    pub fn image(
        source: &ImageSource,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) -> Result<Self, RenderError> {
        if source.is_disposed() {
            return Err(RenderError::InvalidArgument("image source has been disposed"));
        }
        Ok(Self::Image(ImageNode {
            source: source.clone(),
            fill: fill.cloned(),
            pen: pen.cloned(),
        }))
    }

    /// Video frame node, rejecting disposed sources.
    pub fn video(
        source: &VideoSource,
        frame: u64,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) -> Result<Self, RenderError> {
        if source.is_disposed() {
            return Err(RenderError::InvalidArgument("video source has been disposed"));
        }
        Ok(Self::Video(VideoNode {
            source: source.clone(),
            frame,
            fill: fill.cloned(),
            pen: pen.cloned(),
        }))
    }

    /// Returns `true` if both nodes are the same variant.
    pub fn same_kind(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }

    /// Replace the parameters with `new` if they differ.
    ///
    /// Returns `true` if anything changed.
    pub fn update(&mut self, new: Self) -> bool {
        if *self == new {
            false
        } else {
            *self = new;
            true
        }
    }

    /// Area the node may touch, including stroke outsets.
    pub fn bounds(&self) -> Rect {
        let rect = match self {
            Self::Clear { bounds, .. } | Self::DrawBackdrop { bounds, .. } => return *bounds,
            Self::SnapshotBackdrop(_) => return Rect::ZERO,
            Self::Rectangle(s) | Self::Ellipse(s) => {
                Pen::inflate_bounds(s.pen.as_ref(), s.rect.abs())
            }
            Self::Geometry(g) => Pen::inflate_bounds(g.pen.as_ref(), g.path.bounding_box()),
            Self::Text(t) => Pen::inflate_bounds(t.pen.as_ref(), t.text.bounds()),
            Self::Image(i) => Pen::inflate_bounds(
                i.pen.as_ref(),
                Rect::from_origin_size(Point::ZERO, i.source.size()),
            ),
            Self::Video(v) => Pen::inflate_bounds(
                v.pen.as_ref(),
                Rect::from_origin_size(Point::ZERO, v.source.size()),
            ),
        };
        sanitize(rect)
    }

    /// Returns `true` if the node may be rasterized into a render cache.
    ///
    /// Clears and backdrops depend on what is already on the target.
    pub fn is_cacheable(&self) -> bool {
        !matches!(
            self,
            Self::Clear { .. } | Self::SnapshotBackdrop(_) | Self::DrawBackdrop { .. }
        )
    }

    /// Operations that draw this node.
    pub(crate) fn process(&self) -> Vec<BoxedOperation> {
        match self {
            Self::SnapshotBackdrop(handle) => {
                let capture = handle.clone();
                let release = handle.clone();
                vec![Box::new(
                    LambdaOperation::new(Rect::ZERO, move |canvas: &mut dyn Canvas| {
                        capture.set(canvas.snapshot());
                    })
                    .on_dispose(move || release.set(None)),
                )]
            }
            Self::DrawBackdrop { handle, bounds } => {
                let handle = handle.clone();
                vec![Box::new(LambdaOperation::new(
                    *bounds,
                    move |canvas: &mut dyn Canvas| {
                        if let Some(backdrop) = handle.get() {
                            canvas.draw_backdrop(&backdrop);
                        } else {
                            log::debug!("backdrop drawn before its snapshot rendered");
                        }
                    },
                ))]
            }
            _ => vec![Box::new(DrawOperation {
                bounds: self.bounds(),
                node: self.clone(),
            })],
        }
    }
}

/// Renders one [`DrawNode`] with the canvas draw call of the same name.
#[derive(Debug)]
pub(crate) struct DrawOperation {
    node: DrawNode,
    bounds: Rect,
}

fn shape_hit(shape: &impl Shape, fill: bool, pen: Option<&Pen>, point: Point) -> bool {
    if fill && shape.contains(point) {
        return true;
    }
    pen.is_some_and(|pen| {
        let outline = kurbo::stroke(
            shape.path_elements(HIT_TOLERANCE),
            &pen.style,
            &StrokeOpts::default(),
            HIT_TOLERANCE,
        );
        outline.winding(point) != 0
    })
}

impl Operation for DrawOperation {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        match &self.node {
            DrawNode::Clear { color, .. } => canvas.clear(*color),
            DrawNode::Rectangle(s) => {
                canvas.draw_rectangle(s.rect, s.fill.as_ref(), s.pen.as_ref());
            }
            DrawNode::Ellipse(s) => canvas.draw_ellipse(s.rect, s.fill.as_ref(), s.pen.as_ref()),
            DrawNode::Geometry(g) => {
                canvas.draw_geometry(&g.path, g.fill_rule, g.fill.as_ref(), g.pen.as_ref());
            }
            DrawNode::Text(t) => canvas.draw_text(&t.text, t.fill.as_ref(), t.pen.as_ref()),
            DrawNode::Image(i) => {
                if i.source.is_disposed() {
                    log::debug!("skipping image disposed after replay");
                    return;
                }
                let bitmap = i.source.bitmap();
                let dest = Rect::from_origin_size(Point::ZERO, bitmap.size());
                canvas.draw_image(bitmap, dest, i.fill.as_ref(), i.pen.as_ref());
            }
            DrawNode::Video(v) => match v.source.read_frame(v.frame) {
                Some(bitmap) => {
                    let dest = Rect::from_origin_size(Point::ZERO, v.source.size());
                    canvas.draw_image(&bitmap, dest, v.fill.as_ref(), v.pen.as_ref());
                }
                None => log::debug!("video frame {} unavailable", v.frame),
            },
            DrawNode::SnapshotBackdrop(_) | DrawNode::DrawBackdrop { .. } => {}
        }
    }

    fn hit_test(&self, point: Point) -> bool {
        match &self.node {
            DrawNode::Rectangle(s) => {
                shape_hit(&s.rect.abs(), s.fill.is_some(), s.pen.as_ref(), point)
            }
            DrawNode::Ellipse(s) => shape_hit(
                &Ellipse::from_rect(s.rect.abs()),
                s.fill.is_some(),
                s.pen.as_ref(),
                point,
            ),
            DrawNode::Geometry(g) => {
                let w = g.path.winding(point);
                let inside = match g.fill_rule {
                    FillRule::NonZero => w != 0,
                    FillRule::EvenOdd => w % 2 != 0,
                };
                (g.fill.is_some() && inside) || shape_hit(&*g.path, false, g.pen.as_ref(), point)
            }
            DrawNode::Text(_) | DrawNode::Image(_) | DrawNode::Video(_) => {
                self.bounds.contains(point)
            }
            DrawNode::Clear { .. }
            | DrawNode::SnapshotBackdrop(_)
            | DrawNode::DrawBackdrop { .. } => false,
        }
    }
}
