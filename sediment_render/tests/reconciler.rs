// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Replay behavior of `GraphicsContext2D` against a persistent tree.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use kurbo::{Affine, Rect, Size};
use peniko::{Brush, Color};
use sediment_imaging::{
    Bitmap, ClipOperation, GraphicsDevice, ImageSource, TransformOperator, VideoDecoder,
    VideoSource,
};
use sediment_imaging_ref::RefCanvas;
use sediment_render::{
    AlignmentX, AlignmentY, BoundaryTransform, DrawNode, GraphicsContext2D, NodeId, NodeKind,
    RenderError, RenderNodeProcessor, RenderTree, Renderable, Scope,
};

const SIZE: Size = Size::new(32.0, 32.0);

fn solid(r: u8, g: u8, b: u8) -> Brush {
    Brush::Solid(Color::from_rgba8(r, g, b, 255))
}

fn replay(
    tree: &mut RenderTree,
    draw: impl FnOnce(&mut GraphicsContext2D<'_>),
) -> sediment_render::ReplayStats {
    let mut ctx = GraphicsContext2D::new(tree, SIZE);
    draw(&mut ctx);
    ctx.finish()
}

fn render(tree: &mut RenderTree) -> RefCanvas {
    let device = GraphicsDevice::null();
    let root = tree.root();
    let mut canvas = RefCanvas::new(32, 32);
    RenderNodeProcessor::new(tree, &device, false).render(&mut canvas, root);
    canvas
}

#[test]
fn same_position_same_kind_is_reused() {
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        ctx.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 4.0), Some(&solid(255, 0, 0)), None);
        ctx.draw_ellipse(Rect::new(4.0, 4.0, 8.0, 8.0), Some(&solid(0, 255, 0)), None);
        ctx.draw_rectangle(Rect::new(8.0, 8.0, 12.0, 12.0), Some(&solid(0, 0, 255)), None);
    });
    let before = tree.children(tree.root()).to_vec();

    let stats = replay(&mut tree, |ctx| {
        ctx.draw_rectangle(Rect::new(0.0, 0.0, 6.0, 6.0), Some(&solid(255, 0, 0)), None);
        ctx.draw_rectangle(Rect::new(4.0, 4.0, 8.0, 8.0), Some(&solid(0, 255, 0)), None);
        ctx.draw_rectangle(Rect::new(8.0, 8.0, 12.0, 12.0), Some(&solid(0, 0, 255)), None);
    });
    let after = tree.children(tree.root()).to_vec();

    assert_eq!(stats.updated, 1);
    assert_eq!(stats.replaced, 1);
    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.disposed, 1);
    assert_eq!(before[0], after[0]);
    assert_ne!(before[1], after[1]);
    assert!(!tree.is_alive(before[1]));
    assert_eq!(before[2], after[2]);
}

#[test]
fn trailing_nodes_are_disposed_once() {
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        for i in 0..4 {
            let x = f64::from(i) * 4.0;
            ctx.draw_rectangle(Rect::new(x, 0.0, x + 4.0, 4.0), Some(&solid(255, 0, 0)), None);
        }
    });
    assert_eq!(tree.len(), 5);

    let untracked = Rc::new(RefCell::new(Vec::<NodeId>::new()));
    let seen = untracked.clone();
    let stats = {
        let mut ctx = GraphicsContext2D::new(&mut tree, SIZE)
            .on_untracked(move |id, _| seen.borrow_mut().push(id));
        ctx.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 4.0), Some(&solid(255, 0, 0)), None);
        ctx.finish()
    };

    assert_eq!(stats.disposed, 3);
    assert_eq!(untracked.borrow().len(), 3);
    assert_eq!(tree.len(), 2);
    for id in untracked.borrow().iter() {
        assert!(!tree.is_alive(*id));
    }
}

#[test]
fn nested_scopes_truncate_per_container() {
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        let mut clip = ctx.push_clip(Rect::new(0.0, 0.0, 16.0, 16.0), ClipOperation::Intersect);
        clip.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 4.0), Some(&solid(255, 0, 0)), None);
        clip.draw_rectangle(Rect::new(4.0, 0.0, 8.0, 4.0), Some(&solid(255, 0, 0)), None);
    });
    let container = tree.children(tree.root())[0];
    assert_eq!(tree.children(container).len(), 2);

    let stats = replay(&mut tree, |ctx| {
        let mut clip = ctx.push_clip(Rect::new(0.0, 0.0, 16.0, 16.0), ClipOperation::Intersect);
        clip.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 4.0), Some(&solid(255, 0, 0)), None);
    });
    assert_eq!(stats.disposed, 1);
    assert_eq!(tree.children(tree.root()), &[container]);
    assert_eq!(tree.children(container).len(), 1);
}

#[test]
fn changed_container_kind_adopts_children() {
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        let mut faded = ctx.push_opacity(0.5);
        faded.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 4.0), Some(&solid(255, 0, 0)), None);
    });
    let old = tree.children(tree.root())[0];
    let leaf = tree.children(old)[0];

    let stats = replay(&mut tree, |ctx| {
        let mut moved =
            ctx.push_transform(Affine::translate((2.0, 0.0)), TransformOperator::Prepend);
        moved.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 4.0), Some(&solid(255, 0, 0)), None);
    });

    let new = tree.children(tree.root())[0];
    assert_ne!(old, new);
    assert!(!tree.is_alive(old));
    assert_eq!(tree.children(new), &[leaf]);
    assert_eq!(stats.replaced, 1);
    assert_eq!(stats.unchanged, 1);
    assert!(matches!(tree.kind(new), Some(NodeKind::Container(Scope::Transform { .. }))));
    assert_eq!(tree.bounds(tree.root()), Rect::new(2.0, 0.0, 6.0, 4.0));
}

#[test]
fn disposed_source_fails_without_touching_the_tree() {
    let mut tree = RenderTree::new();
    let image = ImageSource::new(Bitmap::solid(4, 4, [255, 255, 255, 255]));
    replay(&mut tree, |ctx| {
        ctx.draw_image(&image, None, None).unwrap();
    });
    let before = tree.children(tree.root()).to_vec();
    image.dispose();

    let mut ctx = GraphicsContext2D::new(&mut tree, SIZE);
    let result = ctx.draw_image(&image, None, None);
    assert!(matches!(result, Err(RenderError::InvalidArgument(_))));
    assert_eq!(ctx.index(), 0);
    drop(ctx);

    assert_eq!(tree.children(tree.root()), &before[..]);
    assert!(matches!(
        tree.kind(before[0]),
        Some(NodeKind::Draw(DrawNode::Image(_)))
    ));
}

struct Leaky;

impl Renderable for Leaky {
    fn render(&self, context: &mut GraphicsContext2D<'_>) -> Result<(), RenderError> {
        let scope = context.push_opacity(0.5);
        std::mem::forget(scope);
        context.draw_rectangle(Rect::new(0.0, 0.0, 2.0, 2.0), None, None);
        Ok(())
    }
}

#[test]
fn nested_renderables_cannot_leak_scopes() {
    let mut tree = RenderTree::new();
    let mut ctx = GraphicsContext2D::new(&mut tree, SIZE);
    ctx.draw_renderable(&Leaky).unwrap();
    assert_eq!(ctx.depth(), 0);
    ctx.draw_rectangle(Rect::new(4.0, 4.0, 6.0, 6.0), None, None);
    ctx.finish();
    assert_eq!(tree.children(tree.root()).len(), 2);
}

#[test]
fn clip_limits_pixels_and_bounds() {
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        let mut clip = ctx.push_clip(Rect::new(0.0, 0.0, 5.0, 5.0), ClipOperation::Intersect);
        clip.draw_rectangle(Rect::new(0.0, 0.0, 10.0, 10.0), Some(&solid(255, 0, 0)), None);
    });
    assert_eq!(tree.bounds(tree.root()), Rect::new(0.0, 0.0, 5.0, 5.0));
    let canvas = render(&mut tree);
    assert_eq!(canvas.pixmap().pixel_rgba8(2, 2), [255, 0, 0, 255]);
    assert_eq!(canvas.pixmap().pixel_rgba8(7, 7), [0, 0, 0, 0]);
}

#[test]
fn boundary_transform_aligns_content() {
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        let mut placed = ctx.push_boundary_transform(BoundaryTransform {
            screen: SIZE,
            align_x: AlignmentX::Right,
            align_y: AlignmentY::Bottom,
            ..BoundaryTransform::default()
        });
        placed.draw_rectangle(Rect::new(2.0, 2.0, 6.0, 6.0), Some(&solid(0, 0, 255)), None);
    });
    assert_eq!(tree.bounds(tree.root()), Rect::new(28.0, 28.0, 32.0, 32.0));
    let canvas = render(&mut tree);
    assert_eq!(canvas.pixmap().pixel_rgba8(30, 30), [0, 0, 255, 255]);
    assert_eq!(canvas.pixmap().pixel_rgba8(3, 3), [0, 0, 0, 0]);
}

#[test]
fn split_transform_places_each_piece() {
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        let mut placed = ctx.push_split_transform(BoundaryTransform {
            screen: SIZE,
            ..BoundaryTransform::default()
        });
        placed.draw_rectangle(Rect::new(4.0, 4.0, 8.0, 8.0), Some(&solid(255, 0, 0)), None);
        placed.draw_rectangle(Rect::new(20.0, 20.0, 22.0, 22.0), Some(&solid(0, 255, 0)), None);
    });
    assert_eq!(tree.bounds(tree.root()), Rect::new(0.0, 0.0, 4.0, 4.0));
}

struct Frames;

impl VideoDecoder for Frames {
    fn frame_rate(&self) -> f64 {
        10.0
    }

    fn frame_size(&self) -> (u32, u32) {
        (2, 2)
    }

    fn frame_count(&self) -> u64 {
        100
    }

    fn read_frame(&mut self, frame: u64) -> Option<Bitmap> {
        let shade = u8::try_from(frame).ok()?;
        Some(Bitmap::solid(2, 2, [shade, 0, 0, 255]))
    }
}

#[test]
fn video_frames_update_by_time() {
    let video = VideoSource::new(Frames);
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        ctx.draw_video_at(&video, Duration::from_millis(1_000), None, None).unwrap();
    });
    let same = replay(&mut tree, |ctx| {
        ctx.draw_video_at(&video, Duration::from_millis(1_050), None, None).unwrap();
    });
    assert!(same.is_unchanged());
    let next = replay(&mut tree, |ctx| {
        ctx.draw_video_at(&video, Duration::from_millis(1_100), None, None).unwrap();
    });
    assert_eq!(next.updated, 1);
    let canvas = render(&mut tree);
    assert_eq!(canvas.pixmap().pixel_rgba8(0, 0), [11, 0, 0, 255]);
}

#[test]
fn backdrop_redraws_captured_pixels() {
    let mut tree = RenderTree::new();
    replay(&mut tree, |ctx| {
        ctx.draw_rectangle(Rect::new(0.0, 0.0, 4.0, 4.0), Some(&solid(255, 0, 0)), None);
        let backdrop = ctx.snapshot();
        ctx.clear(None);
        ctx.draw_backdrop(&backdrop);
    });
    let canvas = render(&mut tree);
    assert_eq!(canvas.pixmap().pixel_rgba8(1, 1), [255, 0, 0, 255]);
}
