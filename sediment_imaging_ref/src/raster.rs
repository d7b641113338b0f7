// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point-sampled scan conversion.
//!
//! Every pixel whose center falls inside a shape is fully covered. There is no
//! anti-aliasing, which keeps results exact and easy to assert on.

use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape, StrokeOpts};
use peniko::Fill as FillRule;
use sediment_imaging::Pen;

use crate::pixmap::{Pixmap, Premul, src_over};

const TOLERANCE: f64 = 0.1;

/// Per-pixel clip coverage in device space.
#[derive(Clone, Debug)]
pub(crate) struct Mask {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Mask {
    pub(crate) fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub(crate) fn get(&self, x: u32, y: u32) -> f32 {
        if x < self.width && y < self.height {
            self.data[y as usize * self.width as usize + x as usize]
        } else {
            0.0
        }
    }

    pub(crate) fn set(&mut self, x: u32, y: u32, value: f32) {
        if x < self.width && y < self.height {
            self.data[y as usize * self.width as usize + x as usize] = value;
        }
    }
}

/// A shape reduced to a winding query in local coordinates.
pub(crate) trait Coverage {
    fn local_bounds(&self) -> Rect;
    fn contains(&self, p: Point) -> bool;
}

/// Any kurbo shape with a fill rule.
pub(crate) struct Filled<'a, S: Shape> {
    pub(crate) shape: &'a S,
    pub(crate) fill_rule: FillRule,
}

impl<S: Shape> Coverage for Filled<'_, S> {
    fn local_bounds(&self) -> Rect {
        self.shape.bounding_box()
    }

    fn contains(&self, p: Point) -> bool {
        let w = self.shape.winding(p);
        match self.fill_rule {
            FillRule::NonZero => w != 0,
            FillRule::EvenOdd => w % 2 != 0,
        }
    }
}

/// Copy of `path` with every subpath explicitly closed.
pub(crate) fn closed(path: &BezPath) -> BezPath {
    let mut out = BezPath::new();
    let mut open = false;
    for el in path.elements() {
        match el {
            PathEl::MoveTo(_) => {
                if open {
                    out.close_path();
                }
                open = true;
                out.push(*el);
            }
            PathEl::ClosePath => {
                if open {
                    out.close_path();
                }
                open = false;
            }
            _ => out.push(*el),
        }
    }
    if open {
        out.close_path();
    }
    out
}

/// Outline of the stroke of `shape` drawn with `pen`.
pub(crate) fn stroke_outline(shape: &impl Shape, pen: &Pen) -> BezPath {
    kurbo::stroke(
        shape.path_elements(TOLERANCE),
        &pen.style,
        &StrokeOpts::default(),
        TOLERANCE,
    )
}

/// Device pixel range covered by a device-space rectangle, clamped to the target.
#[allow(
    clippy::cast_possible_truncation,
    reason = "values are clamped to the target size before casting"
)]
pub(crate) fn pixel_range(rect: Rect, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let clamp = |v: f64, max: u32| v.clamp(0.0, f64::from(max)) as u32;
    (
        clamp(rect.x0.floor(), width),
        clamp(rect.y0.floor(), height),
        clamp(rect.x1.ceil(), width),
        clamp(rect.y1.ceil(), height),
    )
}

/// Visit every device pixel whose center maps inside `coverage`.
pub(crate) fn for_each_covered(
    coverage: &impl Coverage,
    transform: Affine,
    width: u32,
    height: u32,
    mut f: impl FnMut(u32, u32),
) {
    if transform.determinant().abs() < f64::EPSILON {
        return;
    }
    let inverse = transform.inverse();
    let device = transform.transform_rect_bbox(coverage.local_bounds());
    let (x0, y0, x1, y1) = pixel_range(device, width, height);
    for y in y0..y1 {
        for x in x0..x1 {
            let center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if coverage.contains(inverse * center) {
                f(x, y);
            }
        }
    }
}

/// Source-over `color` into every covered pixel, attenuated by `clip`.
pub(crate) fn fill(
    target: &mut Pixmap,
    coverage: &impl Coverage,
    transform: Affine,
    clip: Option<&Mask>,
    color: Premul,
) {
    let (w, h) = (target.width(), target.height());
    for_each_covered(coverage, transform, w, h, |x, y| {
        let k = clip.map_or(1.0, |m| m.get(x, y));
        if k > 0.0 {
            let src = crate::pixmap::scale(color, k);
            let dst = target.pixel(x, y);
            target.set(x, y, src_over(dst, src));
        }
    });
}
