// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Container nodes: a scope applied to an ordered list of children.

use std::mem;
use std::rc::Rc;

use kurbo::{Affine, BezPath, Point, Rect, Shape, Size, Vec2};
use peniko::{BlendMode, Brush, Fill as FillRule};
use sediment_imaging::{
    ClipOperation, ClipShape, FilterEffect, Geometry, ScopeOp, TransformOperator,
};

use crate::error::RenderError;
use crate::operation::{BoxedOperation, ScopedOperation, union_bounds};

/// Unit of a [`RelativePoint`] coordinate.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RelativeUnit {
    /// Absolute pixels.
    #[default]
    Absolute,
    /// Fraction of the reference size, `0.0..=1.0`.
    Relative,
}

/// A point given in pixels or as a fraction of a size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RelativePoint {
    /// Coordinates, interpreted according to `unit`.
    pub point: Point,
    /// Unit of `point`.
    pub unit: RelativeUnit,
}

impl RelativePoint {
    /// The top-left corner.
    pub const TOP_LEFT: Self = Self::relative(0.0, 0.0);
    /// The center.
    pub const CENTER: Self = Self::relative(0.5, 0.5);

    /// A point in absolute pixels.
    pub const fn absolute(x: f64, y: f64) -> Self {
        Self {
            point: Point::new(x, y),
            unit: RelativeUnit::Absolute,
        }
    }

    /// A point as a fraction of the reference size.
    pub const fn relative(x: f64, y: f64) -> Self {
        Self {
            point: Point::new(x, y),
            unit: RelativeUnit::Relative,
        }
    }

    /// Resolve to pixels inside a box of `size`.
    pub fn to_pixels(self, size: Size) -> Vec2 {
        match self.unit {
            RelativeUnit::Absolute => self.point.to_vec2(),
            RelativeUnit::Relative => {
                Vec2::new(self.point.x * size.width, self.point.y * size.height)
            }
        }
    }
}

impl Default for RelativePoint {
    fn default() -> Self {
        Self::TOP_LEFT
    }
}

/// Horizontal placement of content on the screen.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AlignmentX {
    /// Flush with the left edge.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Flush with the right edge.
    Right,
}

/// Vertical placement of content on the screen.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AlignmentY {
    /// Flush with the top edge.
    #[default]
    Top,
    /// Centered.
    Center,
    /// Flush with the bottom edge.
    Bottom,
}

/// A transform that depends on the bounds of the content it applies to.
///
/// The content is moved so that its bounds start at the origin, transformed
/// around `origin` (resolved against the bounds size) and then placed on a
/// screen of `screen` size according to the alignments.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BoundaryTransform {
    /// Transform applied around `origin`; `None` only aligns.
    pub transform: Option<Affine>,
    /// Pivot of `transform`, relative to the content bounds.
    pub origin: RelativePoint,
    /// Size of the screen the content is aligned on.
    pub screen: Size,
    /// Horizontal alignment.
    pub align_x: AlignmentX,
    /// Vertical alignment.
    pub align_y: AlignmentY,
    /// Compute the transform per child operation instead of for their union.
    pub split: bool,
}

impl BoundaryTransform {
    /// Matrix placing content with the given bounds.
    pub fn matrix(&self, bounds: Rect) -> Affine {
        let size = bounds.size();
        let x = match self.align_x {
            AlignmentX::Left => 0.0,
            AlignmentX::Center => (self.screen.width - size.width) / 2.0,
            AlignmentX::Right => self.screen.width - size.width,
        };
        let y = match self.align_y {
            AlignmentY::Top => 0.0,
            AlignmentY::Center => (self.screen.height - size.height) / 2.0,
            AlignmentY::Bottom => self.screen.height - size.height,
        };
        let local = self.transform.map_or(Affine::IDENTITY, |t| {
            let pivot = self.origin.to_pixels(size);
            Affine::translate(pivot) * t * Affine::translate(-pivot)
        });
        Affine::translate((x, y)) * local * Affine::translate(-bounds.origin().to_vec2())
    }
}

/// Path clip built from a [`Geometry`] handle.
///
/// Like geometry draws, equality uses the handle identity and version.
#[derive(Clone, Debug)]
pub struct GeometryClip {
    /// Source handle.
    pub geometry: Geometry,
    /// Version of `geometry` when `path` was captured.
    pub version: u64,
    /// Snapshot of the path.
    pub path: Rc<BezPath>,
    /// Snapshot of the fill rule.
    pub fill_rule: FillRule,
    /// How the clip combines with the current one.
    pub op: ClipOperation,
}

impl GeometryClip {
    /// Clip for the current contents of `geometry`.
    pub fn new(geometry: &Geometry, op: ClipOperation) -> Result<Self, RenderError> {
        if geometry.is_disposed() {
            return Err(RenderError::InvalidArgument("clip geometry has been disposed"));
        }
        Ok(Self {
            geometry: geometry.clone(),
            version: geometry.version(),
            path: geometry.path(),
            fill_rule: geometry.fill_rule(),
            op,
        })
    }
}

impl PartialEq for GeometryClip {
    fn eq(&self, other: &Self) -> bool {
        self.geometry == other.geometry
            && self.version == other.version
            && self.fill_rule == other.fill_rule
            && self.op == other.op
    }
}

/// The state a container applies to its children.
#[derive(Clone, Debug, PartialEq)]
pub enum Scope {
    /// Plain grouping; children are drawn unchanged.
    Group,
    /// Isolated layer, optionally limited to a local rectangle.
    Layer(Option<Rect>),
    /// Isolated content composited with a blend mode.
    BlendMode(BlendMode),
    /// Rectangular clip.
    RectClip {
        /// Clip rectangle in local coordinates.
        rect: Rect,
        /// How the clip combines with the current one.
        op: ClipOperation,
    },
    /// Path clip.
    GeometryClip(GeometryClip),
    /// Isolated content composited with a constant opacity.
    Opacity(f32),
    /// Isolated content run through a filter effect.
    FilterEffect(FilterEffect),
    /// Isolated content multiplied by the alpha of a brush.
    OpacityMask {
        /// Mask brush.
        brush: Brush,
        /// Area painted by the mask brush.
        bounds: Rect,
        /// Use `1 - alpha`.
        invert: bool,
    },
    /// Transform of the children.
    Transform {
        /// Matrix.
        matrix: Affine,
        /// How the matrix combines with the current transform.
        op: TransformOperator,
    },
    /// Transform derived from the bounds of the children.
    BoundaryTransform(BoundaryTransform),
}

impl Scope {
    /// Returns `true` if both scopes are the same variant.
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

    /// Bounds of the container given the bounds of its children, in order.
    pub fn transform_bounds(&self, children: &[Rect]) -> Rect {
        let Some(union) = children.iter().copied().reduce(|a, b| a.union(b)) else {
            return Rect::ZERO;
        };
        match self {
            Self::Group | Self::BlendMode(_) | Self::Opacity(_) | Self::OpacityMask { .. } => union,
            Self::Layer(limit) => limit.map_or(union, |limit| union.intersect(limit)),
            Self::RectClip { rect, op } => match op {
                ClipOperation::Intersect => union.intersect(*rect),
                ClipOperation::Difference => union,
            },
            Self::GeometryClip(clip) => match clip.op {
                ClipOperation::Intersect => union.intersect(clip.path.bounding_box()),
                ClipOperation::Difference => union,
            },
            Self::FilterEffect(effect) => effect.transform_bounds(union),
            Self::Transform { matrix, .. } => matrix.transform_rect_bbox(union),
            Self::BoundaryTransform(boundary) if boundary.split => children
                .iter()
                .map(|r| boundary.matrix(*r).transform_rect_bbox(*r))
                .reduce(|a, b| a.union(b))
                .unwrap_or(Rect::ZERO),
            Self::BoundaryTransform(boundary) => boundary.matrix(union).transform_rect_bbox(union),
        }
    }

    /// Canvas states that realize this scope.
    fn states(&self) -> Vec<ScopeOp> {
        match self {
            Self::Group => Vec::new(),
            Self::Layer(bounds) => vec![ScopeOp::Layer { bounds: *bounds }],
            Self::BlendMode(mode) => vec![ScopeOp::BlendMode(*mode)],
            Self::RectClip { rect, op } => vec![ScopeOp::Clip {
                shape: ClipShape::Rect(*rect),
                op: *op,
            }],
            Self::GeometryClip(clip) => vec![ScopeOp::Clip {
                shape: ClipShape::Path {
                    path: clip.path.clone(),
                    fill_rule: clip.fill_rule,
                },
                op: clip.op,
            }],
            Self::Opacity(opacity) => vec![ScopeOp::Opacity(*opacity)],
            Self::FilterEffect(effect) => effect
                .push_order()
                .into_iter()
                .map(|desc| ScopeOp::Filter(desc.clone()))
                .collect(),
            Self::OpacityMask {
                brush,
                bounds,
                invert,
            } => vec![ScopeOp::OpacityMask {
                brush: brush.clone(),
                bounds: *bounds,
                invert: *invert,
            }],
            Self::Transform { matrix, op } => vec![ScopeOp::Transform {
                matrix: *matrix,
                op: *op,
            }],
            Self::BoundaryTransform(_) => Vec::new(),
        }
    }

    /// Returns `true` if the scope may be rasterized into a render cache.
    ///
    /// `Set` and `Append` transforms depend on the transform of the target.
    pub fn is_cacheable(&self) -> bool {
        !matches!(
            self,
            Self::Transform {
                op: TransformOperator::Set | TransformOperator::Append,
                ..
            }
        )
    }

    /// Returns `true` if the scope renders its content offscreen as a whole.
    fn is_isolating(&self) -> bool {
        matches!(
            self,
            Self::Layer(_)
                | Self::BlendMode(_)
                | Self::Opacity(_)
                | Self::FilterEffect(_)
                | Self::OpacityMask { .. }
        )
    }

    /// Wrap the operations of the children in this scope.
    ///
    /// Isolating scopes wrap all children in one decorator so that the
    /// composite sees their combined result. The other scopes decorate each
    /// child operation on its own, which keeps hit testing and caching
    /// granular.
    pub(crate) fn process(&self, input: Vec<BoxedOperation>) -> Vec<BoxedOperation> {
        if input.is_empty() {
            return input;
        }
        match self {
            Self::Group => input,
            Self::FilterEffect(effect) if effect.is_empty() => input,
            Self::BoundaryTransform(boundary) => {
                let shared = (!boundary.split)
                    .then(|| union_bounds(&input))
                    .flatten()
                    .map(|union| boundary.matrix(union));
                input
                    .into_iter()
                    .map(|op| {
                        let matrix = shared.unwrap_or_else(|| boundary.matrix(op.bounds()));
                        let bounds = matrix.transform_rect_bbox(op.bounds());
                        Box::new(ScopedOperation::new(
                            vec![ScopeOp::Transform {
                                matrix,
                                op: TransformOperator::Prepend,
                            }],
                            vec![op],
                            bounds,
                        )) as BoxedOperation
                    })
                    .collect()
            }
            _ if self.is_isolating() => {
                let bounds: Vec<Rect> = input.iter().map(|op| op.bounds()).collect();
                let bounds = self.transform_bounds(&bounds);
                vec![Box::new(ScopedOperation::new(self.states(), input, bounds))]
            }
            _ => input
                .into_iter()
                .map(|op| {
                    let bounds = self.transform_bounds(&[op.bounds()]);
                    Box::new(ScopedOperation::new(self.states(), vec![op], bounds))
                        as BoxedOperation
                })
                .collect(),
        }
    }
}
