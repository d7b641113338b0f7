// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared source handles referenced by draw calls.
//!
//! Sources are reference-counted handles with identity equality. They can be
//! disposed explicitly while other handles are still around; render nodes
//! refuse to be built from a disposed source.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::time::Duration;

use kurbo::{BezPath, Point, Rect, Shape, Size};
use peniko::{Fill as FillRule, ImageAlphaType};

/// Decoded RGBA8 pixels.
///
/// Pixel storage is shared between clones; equality compares storage
/// identity, not pixel values.
#[derive(Clone)]
pub struct Bitmap {
    width: u32,
    height: u32,
    alpha_type: ImageAlphaType,
    data: Rc<[u8]>,
}

impl Bitmap {
    /// Wrap tightly packed RGBA8 rows.
    ///
    /// Returns `None` if `data` is not exactly `width * height * 4` bytes.
    pub fn new(
        width: u32,
        height: u32,
        alpha_type: ImageAlphaType,
        data: impl Into<Rc<[u8]>>,
    ) -> Option<Self> {
        let data = data.into();
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            alpha_type,
            data,
        })
    }

    /// A bitmap filled with a single straight-alpha color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let len = width as usize * height as usize;
        let data: Rc<[u8]> = core::iter::repeat_n(rgba, len).flatten().collect();
        Self {
            width,
            height,
            alpha_type: ImageAlphaType::Alpha,
            data,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size in pixels as a kurbo size.
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// Whether color channels are premultiplied.
    pub fn alpha_type(&self) -> ImageAlphaType {
        self.alpha_type
    }

    /// Raw RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The RGBA8 pixel at `(x, y)`, or `None` outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.alpha_type == other.alpha_type
            && Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("alpha_type", &self.alpha_type)
            .finish_non_exhaustive()
    }
}

struct ImageInner {
    bitmap: Bitmap,
    disposed: Cell<bool>,
}

/// A still image that draw calls can reference.
#[derive(Clone)]
pub struct ImageSource(Rc<ImageInner>);

impl ImageSource {
    /// Create a live image source.
    pub fn new(bitmap: Bitmap) -> Self {
        Self(Rc::new(ImageInner {
            bitmap,
            disposed: Cell::new(false),
        }))
    }

    /// The decoded pixels.
    pub fn bitmap(&self) -> &Bitmap {
        &self.0.bitmap
    }

    /// Natural size in pixels.
    pub fn size(&self) -> Size {
        self.0.bitmap.size()
    }

    /// Mark this source as disposed for every handle.
    pub fn dispose(&self) {
        self.0.disposed.set(true);
    }

    /// Returns `true` once [`ImageSource::dispose`] was called on any handle.
    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }
}

impl PartialEq for ImageSource {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSource")
            .field("bitmap", &self.0.bitmap)
            .field("disposed", &self.0.disposed.get())
            .finish()
    }
}

/// Frame access for a video stream.
///
/// Decoding happens outside the render core. Implementations hand over
/// already decoded frames.
pub trait VideoDecoder {
    /// Frames per second.
    fn frame_rate(&self) -> f64;

    /// Frame size in pixels.
    fn frame_size(&self) -> (u32, u32);

    /// Number of frames in the stream.
    fn frame_count(&self) -> u64;

    /// Decode frame `frame`, or `None` if it cannot be produced.
    fn read_frame(&mut self, frame: u64) -> Option<Bitmap>;
}

struct VideoInner {
    decoder: RefCell<Box<dyn VideoDecoder>>,
    disposed: Cell<bool>,
}

/// A video stream that draw calls can reference by frame.
#[derive(Clone)]
pub struct VideoSource(Rc<VideoInner>);

impl VideoSource {
    /// Create a live video source around a decoder.
    pub fn new(decoder: impl VideoDecoder + 'static) -> Self {
        Self(Rc::new(VideoInner {
            decoder: RefCell::new(Box::new(decoder)),
            disposed: Cell::new(false),
        }))
    }

    /// Frames per second.
    pub fn frame_rate(&self) -> f64 {
        self.0.decoder.borrow().frame_rate()
    }

    /// Frame size in pixels.
    pub fn size(&self) -> Size {
        let (w, h) = self.0.decoder.borrow().frame_size();
        Size::new(f64::from(w), f64::from(h))
    }

    /// Frame index shown at `time`, clamped to the last frame.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "the product is non-negative and clamped to the frame count"
    )]
    pub fn frame_at(&self, time: Duration) -> u64 {
        let decoder = self.0.decoder.borrow();
        let last = decoder.frame_count().saturating_sub(1);
        let frame = time.as_secs_f64() * decoder.frame_rate();
        if frame.is_nan() || frame <= 0.0 {
            0
        } else {
            (frame as u64).min(last)
        }
    }

    /// Decode a frame. Disposed sources produce nothing.
    pub fn read_frame(&self, frame: u64) -> Option<Bitmap> {
        if self.is_disposed() {
            return None;
        }
        self.0.decoder.borrow_mut().read_frame(frame)
    }

    /// Mark this source as disposed for every handle.
    pub fn dispose(&self) {
        self.0.disposed.set(true);
    }

    /// Returns `true` once [`VideoSource::dispose`] was called on any handle.
    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }
}

impl PartialEq for VideoSource {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoSource")
            .field("disposed", &self.0.disposed.get())
            .finish_non_exhaustive()
    }
}

struct GeometryInner {
    path: RefCell<Rc<BezPath>>,
    fill_rule: Cell<FillRule>,
    version: Cell<u64>,
    disposed: Cell<bool>,
}

/// A mutable path shared between an item and the nodes drawing it.
///
/// Every mutation bumps [`Geometry::version`], which lets render nodes detect
/// changes without comparing path elements.
#[derive(Clone)]
pub struct Geometry(Rc<GeometryInner>);

impl Geometry {
    /// Create a live geometry.
    pub fn new(path: BezPath, fill_rule: FillRule) -> Self {
        Self(Rc::new(GeometryInner {
            path: RefCell::new(Rc::new(path)),
            fill_rule: Cell::new(fill_rule),
            version: Cell::new(0),
            disposed: Cell::new(false),
        }))
    }

    /// Current path. The returned snapshot is unaffected by later edits.
    pub fn path(&self) -> Rc<BezPath> {
        self.0.path.borrow().clone()
    }

    /// Current fill rule.
    pub fn fill_rule(&self) -> FillRule {
        self.0.fill_rule.get()
    }

    /// Change counter.
    pub fn version(&self) -> u64 {
        self.0.version.get()
    }

    /// Replace the path.
    pub fn set_path(&self, path: BezPath) {
        *self.0.path.borrow_mut() = Rc::new(path);
        self.bump();
    }

    /// Replace the fill rule.
    pub fn set_fill_rule(&self, fill_rule: FillRule) {
        if self.0.fill_rule.replace(fill_rule) != fill_rule {
            self.bump();
        }
    }

    /// Bounding box of the current path.
    pub fn bounds(&self) -> Rect {
        self.0.path.borrow().bounding_box()
    }

    /// Mark this geometry as disposed for every handle.
    pub fn dispose(&self) {
        self.0.disposed.set(true);
    }

    /// Returns `true` once [`Geometry::dispose`] was called on any handle.
    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }

    fn bump(&self) {
        self.0.version.set(self.0.version.get().wrapping_add(1));
    }
}

impl PartialEq for Geometry {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Geometry")
            .field("version", &self.0.version.get())
            .field("fill_rule", &self.0.fill_rule.get())
            .field("disposed", &self.0.disposed.get())
            .finish_non_exhaustive()
    }
}

/// Text that has already been shaped and measured.
///
/// Shaping is external; the render core only needs the string for backends
/// that draw text themselves, plus the measured extent for bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct FormattedText {
    /// The text content.
    pub text: String,
    /// Font size in user space units.
    pub font_size: f32,
    /// Top-left corner of the text box.
    pub position: Point,
    /// Measured extent of the text box.
    pub size: Size,
}

impl FormattedText {
    /// Bounding box of the measured text.
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    struct Frames {
        rate: f64,
        count: u64,
    }

    impl VideoDecoder for Frames {
        fn frame_rate(&self) -> f64 {
            self.rate
        }

        fn frame_size(&self) -> (u32, u32) {
            (2, 2)
        }

        fn frame_count(&self) -> u64 {
            self.count
        }

        fn read_frame(&mut self, frame: u64) -> Option<Bitmap> {
            let v = u8::try_from(frame).ok()?;
            Some(Bitmap::solid(2, 2, [v, v, v, 255]))
        }
    }

    #[test]
    fn bitmap_rejects_wrong_length() {
        assert!(Bitmap::new(2, 2, ImageAlphaType::Alpha, vec![0_u8; 15]).is_none());
        let bmp = Bitmap::new(2, 2, ImageAlphaType::Alpha, vec![0_u8; 16]).unwrap();
        assert_eq!(bmp.pixel(1, 1), Some([0, 0, 0, 0]));
        assert_eq!(bmp.pixel(2, 0), None);
    }

    #[test]
    fn sources_compare_by_identity() {
        let bmp = Bitmap::solid(1, 1, [255, 0, 0, 255]);
        let a = ImageSource::new(bmp.clone());
        let b = ImageSource::new(bmp);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn dispose_is_shared_between_handles() {
        let a = ImageSource::new(Bitmap::solid(1, 1, [0, 0, 0, 0]));
        let b = a.clone();
        a.dispose();
        assert!(b.is_disposed());
    }

    #[test]
    fn video_frame_from_time() {
        let video = VideoSource::new(Frames {
            rate: 30.0,
            count: 90,
        });
        assert_eq!(video.frame_at(Duration::from_millis(0)), 0);
        assert_eq!(video.frame_at(Duration::from_millis(1500)), 45);
        assert_eq!(video.frame_at(Duration::from_secs(10)), 89);
        assert_eq!(video.read_frame(3).unwrap().pixel(0, 0), Some([3, 3, 3, 255]));
        video.dispose();
        assert!(video.read_frame(3).is_none());
    }

    #[test]
    fn geometry_edits_bump_version() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 5.0));
        path.close_path();
        let geometry = Geometry::new(path.clone(), FillRule::NonZero);
        let before = geometry.path();
        assert_eq!(geometry.version(), 0);

        geometry.set_fill_rule(FillRule::NonZero);
        assert_eq!(geometry.version(), 0);
        geometry.set_fill_rule(FillRule::EvenOdd);
        assert_eq!(geometry.version(), 1);
        geometry.set_path(BezPath::new());
        assert_eq!(geometry.version(), 2);
        assert_eq!(*before, path);
        assert_eq!(before.bounding_box(), Rect::new(0.0, 0.0, 10.0, 5.0));
    }
}
