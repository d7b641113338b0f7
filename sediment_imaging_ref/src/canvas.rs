// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reference canvas.

use std::rc::Rc;

use kurbo::{Affine, BezPath, Ellipse, Point, Rect, Shape, Size};
use peniko::{BlendMode, Brush, Color, Fill as FillRule, ImageAlphaType};
use sediment_imaging::{
    Backdrop, Bitmap, Canvas, ClipOperation, ClipShape, FilterDesc, FormattedText, Pen, ScopeOp,
    Surface,
};

use crate::filter;
use crate::pixmap::{Pixmap, Premul, premultiply, scale, src_over};
use crate::raster::{self, Coverage, Filled, Mask};

/// A drawing call observed by [`RefCanvas`].
///
/// Transforms are the user-to-device transform current at the call.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// `clear`.
    Clear(Option<Color>),
    /// `draw_rectangle`.
    Rectangle {
        /// Local rectangle.
        rect: Rect,
        /// Transform at the call.
        transform: Affine,
    },
    /// `draw_ellipse`.
    Ellipse {
        /// Local bounding rectangle.
        rect: Rect,
        /// Transform at the call.
        transform: Affine,
    },
    /// `draw_geometry`.
    Geometry {
        /// Local path bounds.
        bounds: Rect,
        /// Transform at the call.
        transform: Affine,
    },
    /// `draw_text`.
    Text {
        /// Text content.
        text: String,
        /// Transform at the call.
        transform: Affine,
    },
    /// `draw_image`.
    Image {
        /// Local destination rectangle.
        dest: Rect,
        /// Transform at the call.
        transform: Affine,
    },
    /// `draw_surface`.
    Surface {
        /// Surface size in pixels.
        size: Size,
        /// Local top-left position.
        position: Point,
        /// Transform at the call.
        transform: Affine,
    },
    /// `snapshot`.
    Snapshot,
    /// `draw_backdrop`.
    Backdrop,
    /// `push_state`.
    Push(ScopeOp),
    /// One state popped by `pop_state`.
    Pop,
}

#[derive(Debug)]
enum Isolation {
    Layer(Option<Rect>),
    Blend(BlendMode),
    Opacity(f32),
    Filter(FilterDesc),
    Mask {
        brush: Brush,
        bounds: Rect,
        invert: bool,
    },
}

#[derive(Debug)]
struct Layer {
    pixmap: Pixmap,
    isolation: Isolation,
}

#[derive(Debug)]
struct State {
    transform: Affine,
    clip: Option<Rc<Mask>>,
    layer: Option<Layer>,
}

/// CPU reference canvas.
///
/// Rasterizes into a premultiplied [`Pixmap`] by point-sampling pixel centers
/// and records an [`Event`] for every call. Only solid brushes are painted;
/// other brushes are recorded and skipped. Text is recorded only.
///
/// A canvas opened on a [`Surface`] writes its pixels back into the surface
/// when dropped.
#[derive(Debug)]
pub struct RefCanvas {
    base: Pixmap,
    transform: Affine,
    clip: Option<Rc<Mask>>,
    states: Vec<State>,
    events: Vec<Event>,
    surface: Option<Surface>,
}

impl RefCanvas {
    /// A transparent canvas of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_pixmap(Pixmap::new(width, height))
    }

    /// A canvas drawing over existing pixels.
    pub fn from_pixmap(base: Pixmap) -> Self {
        Self {
            base,
            transform: Affine::IDENTITY,
            clip: None,
            states: Vec::new(),
            events: Vec::new(),
            surface: None,
        }
    }

    /// Open a canvas on a surface holding a [`Pixmap`].
    ///
    /// Returns `None` if the surface was allocated by another backend.
    pub fn for_surface(surface: Surface, clear: bool) -> Option<Self> {
        let base = {
            let pixmap = surface.data::<Pixmap>()?;
            if clear {
                Pixmap::new(pixmap.width(), pixmap.height())
            } else {
                pixmap.clone()
            }
        };
        let mut canvas = Self::from_pixmap(base);
        canvas.surface = Some(surface);
        Some(canvas)
    }

    /// Pixels composited so far. Open layers are not included.
    pub fn pixmap(&self) -> &Pixmap {
        &self.base
    }

    /// Pop every state and return the final pixels.
    pub fn into_pixmap(mut self) -> Pixmap {
        self.pop_state(0);
        self.surface = None;
        std::mem::take(&mut self.base)
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take the recorded events, leaving the log empty.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Write the composited pixels back into the bound surface, if any.
    pub fn flush(&mut self) {
        if let Some(surface) = &self.surface {
            if let Some(mut pixels) = surface.data_mut::<Pixmap>() {
                pixels.clone_from(&self.base);
            }
        }
    }

    fn target(&mut self) -> &mut Pixmap {
        match self.states.iter_mut().rev().find_map(|s| s.layer.as_mut()) {
            Some(layer) => &mut layer.pixmap,
            None => &mut self.base,
        }
    }

    fn solid(brush: &Brush) -> Option<Premul> {
        match brush {
            Brush::Solid(color) => Some(premultiply(*color)),
            _ => {
                log::debug!("reference canvas only paints solid brushes");
                None
            }
        }
    }

    fn paint(&mut self, coverage: &impl Coverage, brush: Option<&Brush>) {
        let Some(color) = brush.and_then(Self::solid) else {
            return;
        };
        let transform = self.transform;
        let clip = self.clip.clone();
        raster::fill(self.target(), coverage, transform, clip.as_deref(), color);
    }

    fn fill_and_stroke(&mut self, shape: &impl Shape, fill: Option<&Brush>, pen: Option<&Pen>) {
        self.paint(
            &Filled {
                shape,
                fill_rule: FillRule::NonZero,
            },
            fill,
        );
        if let Some(pen) = pen {
            let outline = raster::stroke_outline(shape, pen);
            self.paint(
                &Filled {
                    shape: &outline,
                    fill_rule: FillRule::NonZero,
                },
                Some(&pen.brush),
            );
        }
    }

    /// Draw `sample(u, v)` over `dest`, where `(u, v)` is in `[0, 1)`.
    fn blit(&mut self, dest: Rect, sample: impl Fn(f64, f64) -> Premul) {
        let dest = dest.abs();
        if dest.width() <= 0.0 || dest.height() <= 0.0 {
            return;
        }
        let transform = self.transform;
        if transform.determinant().abs() < f64::EPSILON {
            return;
        }
        let inverse = transform.inverse();
        let clip = self.clip.clone();
        let target = self.target();
        let (w, h) = (target.width(), target.height());
        let (x0, y0, x1, y1) = raster::pixel_range(transform.transform_rect_bbox(dest), w, h);
        for y in y0..y1 {
            for x in x0..x1 {
                let p = inverse * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if !dest.contains(p) {
                    continue;
                }
                let k = clip.as_deref().map_or(1.0, |m| m.get(x, y));
                if k <= 0.0 {
                    continue;
                }
                let u = (p.x - dest.x0) / dest.width();
                let v = (p.y - dest.y0) / dest.height();
                let src = scale(sample(u, v), k);
                let dst = target.pixel(x, y);
                target.set(x, y, src_over(dst, src));
            }
        }
    }

    fn clip_mask(&self, shape: &ClipShape, op: ClipOperation) -> Mask {
        let Size { width, height } = self.size();
        let (w, h) = (to_px(width), to_px(height));
        let mut inside = Mask::filled(w, h, 0.0);
        match shape {
            ClipShape::Rect(rect) => {
                let rect = rect.abs();
                raster::for_each_covered(
                    &Filled {
                        shape: &rect,
                        fill_rule: FillRule::NonZero,
                    },
                    self.transform,
                    w,
                    h,
                    |x, y| inside.set(x, y, 1.0),
                );
            }
            ClipShape::Path { path, fill_rule } => {
                let closed = raster::closed(path);
                raster::for_each_covered(
                    &Filled {
                        shape: &closed,
                        fill_rule: *fill_rule,
                    },
                    self.transform,
                    w,
                    h,
                    |x, y| inside.set(x, y, 1.0),
                );
            }
        }
        let mut out = Mask::filled(w, h, 0.0);
        for y in 0..h {
            for x in 0..w {
                let current = self.clip.as_deref().map_or(1.0, |m| m.get(x, y));
                let k = match op {
                    ClipOperation::Intersect => current * inside.get(x, y),
                    ClipOperation::Difference => current * (1.0 - inside.get(x, y)),
                };
                out.set(x, y, k);
            }
        }
        out
    }

    fn begin_layer(&mut self, isolation: Isolation) -> Option<Layer> {
        if let Isolation::Blend(mode) = isolation {
            if !crate::pixmap::is_supported(mode) {
                log::debug!("reference canvas blends {mode:?} as normal");
            }
        }
        let target = self.target();
        Some(Layer {
            pixmap: Pixmap::new(target.width(), target.height()),
            isolation,
        })
    }

    fn end_layer(&mut self, layer: Layer, transform: Affine) {
        let Layer {
            mut pixmap,
            isolation,
        } = layer;
        let mut mode = None;
        let mut opacity = 1.0;
        match isolation {
            Isolation::Layer(None) => {}
            Isolation::Layer(Some(bounds)) => {
                let limit = keep_mask(&pixmap, bounds.abs(), transform);
                for (px, k) in pixmap.data_mut().iter_mut().zip(limit) {
                    *px = scale(*px, k);
                }
            }
            Isolation::Blend(m) => mode = Some(m),
            Isolation::Opacity(o) => opacity = o.clamp(0.0, 1.0),
            Isolation::Filter(desc) => pixmap = filter::apply(&desc, &pixmap, transform),
            Isolation::Mask {
                brush,
                bounds,
                invert,
            } => {
                let alpha = match &brush {
                    Brush::Solid(color) => color.components[3],
                    _ => {
                        log::debug!("reference canvas treats non-solid mask brushes as opaque");
                        1.0
                    }
                };
                let inside = keep_mask(&pixmap, bounds.abs(), transform);
                for (px, k) in pixmap.data_mut().iter_mut().zip(inside) {
                    let m = k * alpha;
                    *px = scale(*px, if invert { 1.0 - m } else { m });
                }
            }
        }
        let clip = self.clip.clone();
        let target = self.target();
        let width = pixmap.width();
        for (i, src) in pixmap.data().iter().enumerate() {
            let (x, y) = (index_x(i, width), index_y(i, width));
            let k = clip.as_deref().map_or(1.0, |m| m.get(x, y)) * opacity;
            if k <= 0.0 || src[3] <= 0.0 {
                continue;
            }
            let src = scale(*src, k);
            let dst = target.pixel(x, y);
            let out = match mode {
                Some(mode) => crate::pixmap::blend(dst, src, mode),
                None => src_over(dst, src),
            };
            target.set(x, y, out);
        }
    }

    fn record(&mut self, event: Event) {
        self.events.push(event);
    }
}

impl Drop for RefCanvas {
    fn drop(&mut self) {
        if self.surface.is_some() {
            self.pop_state(0);
            self.flush();
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "canvas sizes come from u32 pixel counts"
)]
fn to_px(v: f64) -> u32 {
    v.max(0.0) as u32
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "indices come from a pixmap with u32 dimensions"
)]
fn index_x(i: usize, width: u32) -> u32 {
    (i % width as usize) as u32
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "indices come from a pixmap with u32 dimensions"
)]
fn index_y(i: usize, width: u32) -> u32 {
    (i / width as usize) as u32
}

/// 1.0 for pixels whose center maps inside `bounds`, 0.0 elsewhere.
fn keep_mask(pixmap: &Pixmap, bounds: Rect, transform: Affine) -> Vec<f32> {
    let (w, h) = (pixmap.width(), pixmap.height());
    let mut mask = Mask::filled(w, h, 0.0);
    raster::for_each_covered(
        &Filled {
            shape: &bounds,
            fill_rule: FillRule::NonZero,
        },
        transform,
        w,
        h,
        |x, y| mask.set(x, y, 1.0),
    );
    (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .map(|(x, y)| mask.get(x, y))
        .collect()
}

fn bitmap_sampler(image: &Bitmap) -> impl Fn(f64, f64) -> Premul + '_ {
    let (w, h) = (image.width(), image.height());
    let premultiplied = matches!(image.alpha_type(), ImageAlphaType::AlphaPremultiplied);
    move |u, v| {
        let x = to_px((u * f64::from(w)).floor()).min(w.saturating_sub(1));
        let y = to_px((v * f64::from(h)).floor()).min(h.saturating_sub(1));
        let Some([r, g, b, a]) = image.pixel(x, y) else {
            return [0.0; 4];
        };
        let c = [r, g, b, a].map(|c| f32::from(c) / 255.0);
        if premultiplied {
            c
        } else {
            [c[0] * c[3], c[1] * c[3], c[2] * c[3], c[3]]
        }
    }
}

impl Canvas for RefCanvas {
    fn size(&self) -> Size {
        Size::new(f64::from(self.base.width()), f64::from(self.base.height()))
    }

    fn transform(&self) -> Affine {
        self.transform
    }

    fn state_depth(&self) -> usize {
        self.states.len()
    }

    fn push_state(&mut self, op: ScopeOp) -> usize {
        let depth = self.states.len();
        self.record(Event::Push(op.clone()));
        let saved_transform = self.transform;
        let saved_clip = self.clip.clone();
        let layer = match op {
            ScopeOp::Save => None,
            ScopeOp::Transform { matrix, op } => {
                self.transform = op.apply(self.transform, matrix);
                None
            }
            ScopeOp::Clip { shape, op } => {
                self.clip = Some(Rc::new(self.clip_mask(&shape, op)));
                None
            }
            ScopeOp::Layer { bounds } => self.begin_layer(Isolation::Layer(bounds)),
            ScopeOp::BlendMode(mode) => self.begin_layer(Isolation::Blend(mode)),
            ScopeOp::Opacity(opacity) => self.begin_layer(Isolation::Opacity(opacity)),
            ScopeOp::Filter(desc) => self.begin_layer(Isolation::Filter(desc)),
            ScopeOp::OpacityMask {
                brush,
                bounds,
                invert,
            } => self.begin_layer(Isolation::Mask {
                brush,
                bounds,
                invert,
            }),
        };
        self.states.push(State {
            transform: saved_transform,
            clip: saved_clip,
            layer,
        });
        depth
    }

    fn pop_state(&mut self, depth: usize) {
        while self.states.len() > depth {
            let Some(state) = self.states.pop() else {
                break;
            };
            self.record(Event::Pop);
            // Layer content is resolved with the transform that was active inside it.
            let inner_transform = self.transform;
            self.transform = state.transform;
            self.clip = state.clip;
            if let Some(layer) = state.layer {
                self.end_layer(layer, inner_transform);
            }
        }
    }

    fn clear(&mut self, color: Option<Color>) {
        self.record(Event::Clear(color));
        let fill = color.map_or([0.0; 4], premultiply);
        self.target().fill(fill);
    }

    fn draw_rectangle(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>) {
        self.record(Event::Rectangle {
            rect,
            transform: self.transform,
        });
        self.fill_and_stroke(&rect.abs(), fill, pen);
    }

    fn draw_ellipse(&mut self, rect: Rect, fill: Option<&Brush>, pen: Option<&Pen>) {
        self.record(Event::Ellipse {
            rect,
            transform: self.transform,
        });
        self.fill_and_stroke(&Ellipse::from_rect(rect.abs()), fill, pen);
    }

    fn draw_geometry(
        &mut self,
        path: &BezPath,
        fill_rule: FillRule,
        fill: Option<&Brush>,
        pen: Option<&Pen>,
    ) {
        self.record(Event::Geometry {
            bounds: path.bounding_box(),
            transform: self.transform,
        });
        let closed = raster::closed(path);
        self.paint(
            &Filled {
                shape: &closed,
                fill_rule,
            },
            fill,
        );
        if let Some(pen) = pen {
            let outline = raster::stroke_outline(path, pen);
            self.paint(
                &Filled {
                    shape: &outline,
                    fill_rule: FillRule::NonZero,
                },
                Some(&pen.brush),
            );
        }
    }

    fn draw_text(&mut self, text: &FormattedText, _fill: Option<&Brush>, _pen: Option<&Pen>) {
        self.record(Event::Text {
            text: text.text.clone(),
            transform: self.transform,
        });
    }

    fn draw_image(&mut self, image: &Bitmap, dest: Rect, _fill: Option<&Brush>, pen: Option<&Pen>) {
        self.record(Event::Image {
            dest,
            transform: self.transform,
        });
        self.blit(dest, bitmap_sampler(image));
        if let Some(pen) = pen {
            self.fill_and_stroke(&dest.abs(), None, Some(pen));
        }
    }

    fn draw_surface(&mut self, surface: &Surface, position: Point) {
        self.record(Event::Surface {
            size: surface.size(),
            position,
            transform: self.transform,
        });
        let Some(pixels) = surface.data::<Pixmap>().map(|p| p.clone()) else {
            log::debug!("reference canvas cannot draw a foreign surface");
            return;
        };
        let (w, h) = (pixels.width(), pixels.height());
        let dest = Rect::from_origin_size(position, surface.size());
        self.blit(dest, |u, v| {
            let x = to_px((u * f64::from(w)).floor()).min(w.saturating_sub(1));
            let y = to_px((v * f64::from(h)).floor()).min(h.saturating_sub(1));
            pixels.pixel(x, y)
        });
    }

    fn snapshot(&mut self) -> Option<Backdrop> {
        self.record(Event::Snapshot);
        let pixels = self.target().clone();
        Some(Backdrop::new(Surface::new(
            pixels.width(),
            pixels.height(),
            pixels,
        )))
    }

    fn draw_backdrop(&mut self, backdrop: &Backdrop) {
        self.record(Event::Backdrop);
        let Some(pixels) = backdrop.surface().data::<Pixmap>().map(|p| p.clone()) else {
            log::debug!("reference canvas cannot draw a foreign backdrop");
            return;
        };
        let clip = self.clip.clone();
        let target = self.target();
        for y in 0..pixels.height().min(target.height()) {
            for x in 0..pixels.width().min(target.width()) {
                let k = clip.as_deref().map_or(1.0, |m| m.get(x, y));
                if k > 0.0 {
                    let dst = target.pixel(x, y);
                    target.set(x, y, src_over(dst, scale(pixels.pixel(x, y), k)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sediment_imaging::{CanvasExt, TransformOperator};

    fn red() -> Brush {
        Brush::Solid(Color::from_rgba8(255, 0, 0, 255))
    }

    #[test]
    fn rectangle_fills_covered_pixels() {
        let mut canvas = RefCanvas::new(4, 4);
        canvas.draw_rectangle(Rect::new(1.0, 1.0, 3.0, 3.0), Some(&red()), None);
        let px = canvas.pixmap();
        assert_eq!(px.pixel_rgba8(1, 1), [255, 0, 0, 255]);
        assert_eq!(px.pixel_rgba8(0, 0), [0, 0, 0, 0]);
        assert_eq!(canvas.events().len(), 1);
    }

    #[test]
    fn transform_moves_drawing() {
        let mut canvas = RefCanvas::new(4, 4);
        {
            let mut t =
                canvas.push_transform(Affine::translate((2.0, 0.0)), TransformOperator::Prepend);
            t.draw_rectangle(Rect::new(0.0, 0.0, 1.0, 1.0), Some(&red()), None);
        }
        assert_eq!(canvas.pixmap().pixel_rgba8(2, 0), [255, 0, 0, 255]);
        assert_eq!(canvas.pixmap().pixel_rgba8(0, 0), [0, 0, 0, 0]);
        assert_eq!(canvas.transform(), Affine::IDENTITY);
    }

    #[test]
    fn clip_limits_drawing() {
        let mut canvas = RefCanvas::new(4, 4);
        {
            let mut c = canvas.push_clip(Rect::new(0.0, 0.0, 2.0, 4.0), ClipOperation::Intersect);
            c.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 4.0), Some(&red()), None);
        }
        assert_eq!(canvas.pixmap().pixel_rgba8(1, 1)[3], 255);
        assert_eq!(canvas.pixmap().pixel_rgba8(3, 1)[3], 0);
    }

    #[test]
    fn difference_clip_excludes_shape() {
        let mut canvas = RefCanvas::new(4, 1);
        {
            let mut c = canvas.push_clip(Rect::new(0.0, 0.0, 2.0, 1.0), ClipOperation::Difference);
            c.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 1.0), Some(&red()), None);
        }
        assert_eq!(canvas.pixmap().pixel_rgba8(0, 0)[3], 0);
        assert_eq!(canvas.pixmap().pixel_rgba8(3, 0)[3], 255);
    }

    #[test]
    fn opacity_layer_composites_on_pop() {
        let mut canvas = RefCanvas::new(2, 2);
        {
            let mut o = canvas.push_opacity(0.5);
            o.draw_rectangle(Rect::new(0.0, 0.0, 2.0, 2.0), Some(&red()), None);
            assert_eq!(o.pixmap().pixel(0, 0), [0.0; 4]);
        }
        let [r, _, _, a] = canvas.pixmap().pixel(0, 0);
        assert!((r - 0.5).abs() < 1e-6 && (a - 0.5).abs() < 1e-6);
    }

    #[test]
    fn surfaces_round_trip_through_factory_canvases() {
        let surface = Surface::new(2, 2, Pixmap::new(2, 2));
        {
            let mut c = RefCanvas::for_surface(surface.clone(), true).unwrap();
            c.draw_rectangle(Rect::new(0.0, 0.0, 1.0, 1.0), Some(&red()), None);
        }
        let mut canvas = RefCanvas::new(4, 4);
        canvas.draw_surface(&surface, Point::new(2.0, 2.0));
        assert_eq!(canvas.pixmap().pixel_rgba8(2, 2), [255, 0, 0, 255]);
        assert_eq!(canvas.pixmap().pixel_rgba8(3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn snapshot_and_backdrop_copy_pixels() {
        let mut canvas = RefCanvas::new(2, 1);
        canvas.draw_rectangle(Rect::new(0.0, 0.0, 1.0, 1.0), Some(&red()), None);
        let backdrop = canvas.snapshot().unwrap();
        canvas.clear(None);
        canvas.draw_backdrop(&backdrop);
        assert_eq!(canvas.pixmap().pixel_rgba8(0, 0), [255, 0, 0, 255]);
        assert_eq!(
            canvas.events().last(),
            Some(&Event::Backdrop),
            "backdrop draw should be recorded"
        );
    }

    #[test]
    fn image_is_sampled_nearest() {
        let mut data = vec![0_u8; 8];
        data[..4].copy_from_slice(&[0, 255, 0, 255]);
        data[4..].copy_from_slice(&[0, 0, 255, 255]);
        let image = Bitmap::new(2, 1, ImageAlphaType::Alpha, data).unwrap();
        let mut canvas = RefCanvas::new(4, 1);
        canvas.draw_image(&image, Rect::new(0.0, 0.0, 4.0, 1.0), None, None);
        assert_eq!(canvas.pixmap().pixel_rgba8(1, 0), [0, 255, 0, 255]);
        assert_eq!(canvas.pixmap().pixel_rgba8(2, 0), [0, 0, 255, 255]);
    }
}
