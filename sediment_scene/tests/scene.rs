// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer and scene orchestration.

use std::cell::Cell;
use std::rc::Rc;

use kurbo::{Point, Rect, Size};
use peniko::{Brush, Color};
use sediment_imaging::GraphicsDevice;
use sediment_imaging_ref::{RefCanvas, RefSurfaceFactory};
use sediment_render::{CacheState, GraphicsContext2D, RenderCacheOptions, RenderError, Renderable};
use sediment_scene::RenderScene;

const SIZE: Size = Size::new(32.0, 32.0);

#[derive(Debug)]
struct Tile {
    rect: Rect,
    rgba: Cell<[u8; 4]>,
    replays: Cell<u32>,
    fail: Cell<bool>,
}

impl Tile {
    fn new(rect: Rect, rgba: [u8; 4]) -> Rc<Self> {
        Rc::new(Self {
            rect,
            rgba: Cell::new(rgba),
            replays: Cell::new(0),
            fail: Cell::new(false),
        })
    }
}

impl Renderable for Tile {
    fn render(&self, ctx: &mut GraphicsContext2D<'_>) -> Result<(), RenderError> {
        self.replays.set(self.replays.get() + 1);
        let [r, g, b, a] = self.rgba.get();
        let brush = Brush::Solid(Color::from_rgba8(r, g, b, a));
        ctx.draw_rectangle(self.rect, Some(&brush), None);
        if self.fail.get() {
            return Err(RenderError::Item("tile refused to draw".into()));
        }
        Ok(())
    }
}

fn dyn_item(tile: &Rc<Tile>) -> Rc<dyn Renderable> {
    tile.clone()
}

fn draw(scene: &mut RenderScene) -> RefCanvas {
    let mut canvas = RefCanvas::new(32, 32);
    scene.render(&mut canvas);
    canvas
}

#[test]
fn items_replay_only_when_invalidated() {
    let tile = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let item = dyn_item(&tile);
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);

    let damage = scene.update(0, &[item.clone()]);
    assert_eq!(damage.dirty_rects, [Rect::new(0.0, 0.0, 8.0, 8.0)]);
    assert!(scene.update(0, &[item.clone()]).is_empty());
    assert_eq!(tile.replays.get(), 1);

    tile.rgba.set([0, 0, 255, 255]);
    assert!(scene.invalidate(&item));
    assert_eq!(scene.layer(0).and_then(|l| l.is_dirty(&item)), Some(true));
    let damage = scene.update(0, &[item.clone()]);
    assert_eq!(tile.replays.get(), 2);
    assert_eq!(damage.union_rect(), Some(Rect::new(0.0, 0.0, 8.0, 8.0)));
    assert_eq!(draw(&mut scene).pixmap().pixel_rgba8(2, 2), [0, 0, 255, 255]);
}

#[test]
fn identity_not_value_keys_items() {
    let a = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let b = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);
    scene.update(0, &[dyn_item(&a), dyn_item(&b)]);
    assert_eq!(scene.layer(0).map(|l| l.len()), Some(2));
    assert_eq!(b.replays.get(), 1);
}

#[test]
fn missing_items_are_disposed() {
    let keep = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let gone = Tile::new(Rect::new(16.0, 16.0, 24.0, 24.0), [0, 255, 0, 255]);
    let (keep_item, gone_item) = (dyn_item(&keep), dyn_item(&gone));
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);
    scene.update(0, &[keep_item.clone(), gone_item.clone()]);

    let damage = scene.update(0, &[keep_item.clone()]);
    assert_eq!(damage.dirty_rects, [Rect::new(16.0, 16.0, 24.0, 24.0)]);
    let layer = scene.layer(0).unwrap();
    assert!(!layer.contains(&gone_item));
    assert!(layer.tree(&gone_item).is_none());
    assert_eq!(draw(&mut scene).pixmap().pixel_rgba8(20, 20), [0, 0, 0, 0]);

    // The scene no longer holds the item.
    drop(gone_item);
    assert_eq!(Rc::strong_count(&gone), 1);
    assert_eq!(Rc::weak_count(&gone), 0);
}

#[test]
fn scene_does_not_keep_items_alive() {
    let tile = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let item = dyn_item(&tile);
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);
    scene.update(0, &[item.clone()]);
    drop(item);
    assert_eq!(Rc::strong_count(&tile), 1);
    assert_eq!(scene.update(0, &[]).dirty_rects.len(), 1);
    assert!(scene.boundaries().is_empty());
}

#[test]
fn higher_layers_draw_and_hit_on_top() {
    let low = Tile::new(Rect::new(0.0, 0.0, 16.0, 16.0), [255, 0, 0, 255]);
    let high = Tile::new(Rect::new(8.0, 8.0, 24.0, 24.0), [0, 0, 255, 255]);
    let (low_item, high_item) = (dyn_item(&low), dyn_item(&high));
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);
    scene.update(5, &[high_item.clone()]);
    scene.update(-1, &[low_item.clone()]);
    assert_eq!(scene.z_indices().collect::<Vec<_>>(), [-1, 5]);

    let canvas = draw(&mut scene);
    assert_eq!(canvas.pixmap().pixel_rgba8(4, 4), [255, 0, 0, 255]);
    assert_eq!(canvas.pixmap().pixel_rgba8(12, 12), [0, 0, 255, 255]);

    let hit = scene.hit_test(Point::new(12.0, 12.0)).unwrap();
    assert!(Rc::ptr_eq(&hit, &high_item));
    let hit = scene.hit_test(Point::new(4.0, 4.0)).unwrap();
    assert!(Rc::ptr_eq(&hit, &low_item));
    assert!(scene.hit_test(Point::new(30.0, 30.0)).is_none());

    let boundaries: Vec<Rect> = scene.boundaries().into_iter().map(|(_, b)| b).collect();
    assert_eq!(
        boundaries,
        [Rect::new(0.0, 0.0, 16.0, 16.0), Rect::new(8.0, 8.0, 24.0, 24.0)]
    );
}

#[test]
fn failing_item_is_isolated_and_retried() {
    let ok = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let bad = Tile::new(Rect::new(16.0, 0.0, 24.0, 8.0), [0, 255, 0, 255]);
    bad.fail.set(true);
    let (ok_item, bad_item) = (dyn_item(&ok), dyn_item(&bad));
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);

    // What the failing item drew before failing is tracked like any output.
    let damage = scene.update(0, &[bad_item.clone(), ok_item.clone()]);
    assert_eq!(
        damage.dirty_rects,
        [Rect::new(16.0, 0.0, 24.0, 8.0), Rect::new(0.0, 0.0, 8.0, 8.0)]
    );
    let layer = scene.layer(0).unwrap();
    assert_eq!(layer.has_failed(&bad_item), Some(true));
    assert_eq!(layer.is_dirty(&bad_item), Some(true));
    assert_eq!(layer.has_failed(&ok_item), Some(false));
    assert_eq!(scene.boundaries().len(), 2);
    let canvas = draw(&mut scene);
    assert_eq!(canvas.pixmap().pixel_rgba8(2, 2), [255, 0, 0, 255]);
    assert_eq!(canvas.pixmap().pixel_rgba8(20, 2), [0, 255, 0, 255]);
    let hit = scene.hit_test(Point::new(20.0, 2.0)).unwrap();
    assert!(Rc::ptr_eq(&hit, &bad_item));

    // Retried at every update; the same partial output is no new damage.
    assert!(scene.update(0, &[bad_item.clone(), ok_item.clone()]).is_empty());
    assert_eq!(bad.replays.get(), 2);
    assert_eq!(ok.replays.get(), 1);

    bad.fail.set(false);
    bad.rgba.set([0, 0, 255, 255]);
    let damage = scene.update(0, &[bad_item.clone(), ok_item.clone()]);
    assert_eq!(damage.union_rect(), Some(Rect::new(16.0, 0.0, 24.0, 8.0)));
    let layer = scene.layer(0).unwrap();
    assert_eq!(layer.has_failed(&bad_item), Some(false));
    assert_eq!(layer.is_dirty(&bad_item), Some(false));
}

#[test]
fn duplicated_failing_item_replays_once_per_update() {
    let bad = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [0, 255, 0, 255]);
    bad.fail.set(true);
    let item = dyn_item(&bad);
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);
    scene.update(0, &[item.clone(), item.clone()]);
    assert_eq!(bad.replays.get(), 1);
}

#[test]
fn resizing_replays_everything() {
    let tile = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let item = dyn_item(&tile);
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);
    scene.update(0, &[item.clone()]);
    scene.set_size(SIZE);
    scene.update(0, &[item.clone()]);
    assert_eq!(tile.replays.get(), 1);
    scene.set_size(Size::new(64.0, 64.0));
    scene.update(0, &[item.clone()]);
    assert_eq!(tile.replays.get(), 2);
}

#[test]
fn static_items_end_up_cached() {
    let tiles = [
        Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]),
        Tile::new(Rect::new(4.0, 4.0, 12.0, 12.0), [0, 0, 255, 128]),
    ];
    let items: Vec<Rc<dyn Renderable>> = tiles.iter().map(dyn_item).collect();
    let factory = Rc::new(RefSurfaceFactory::new());
    let mut cached = RenderScene::new(GraphicsDevice::from_shared(factory.clone()), SIZE);
    let mut plain = RenderScene::with_cache_options(
        GraphicsDevice::null(),
        SIZE,
        RenderCacheOptions::DISABLED,
    );

    for frame in 0..6 {
        cached.update(0, &items);
        plain.update(0, &items);
        let expected = draw(&mut plain).into_pixmap();
        let actual = draw(&mut cached).into_pixmap();
        assert_eq!(actual.max_difference(&expected), Some(0.0), "frame {frame}");
    }
    let layer = cached.layer(0).unwrap();
    for item in &items {
        let tree = layer.tree(item).unwrap();
        assert_eq!(tree.cache(tree.root()).map(|c| c.state()), Some(CacheState::Cached));
    }
    assert_eq!(factory.allocations(), 2);

    cached.set_cache_options(RenderCacheOptions::DISABLED);
    assert!(!cached.cache_options().is_enabled);
    let tree = cached.layer(0).unwrap().tree(&items[0]).unwrap();
    assert!(!tree.cache(tree.root()).unwrap().is_cached());
}

#[test]
fn shut_down_device_stops_caching() {
    let tile = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let item = dyn_item(&tile);
    let mut scene = RenderScene::new(GraphicsDevice::new(RefSurfaceFactory::new()), SIZE);
    scene.update(0, &[item.clone()]);
    for _ in 0..3 {
        draw(&mut scene);
    }
    scene.shutdown_device();
    assert!(!scene.device().is_available());
    for _ in 0..3 {
        assert_eq!(draw(&mut scene).pixmap().pixel_rgba8(2, 2), [255, 0, 0, 255]);
    }
    let tree = scene.layer(0).unwrap().tree(&item).unwrap();
    assert!(!tree.cache(tree.root()).unwrap().is_cached());
}

#[test]
fn dispose_empties_every_layer() {
    let a = Tile::new(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 0, 0, 255]);
    let b = Tile::new(Rect::new(8.0, 8.0, 16.0, 16.0), [255, 0, 0, 255]);
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);
    scene.update(0, &[dyn_item(&a)]);
    scene.update(1, &[dyn_item(&b)]);

    let damage = scene.remove_layer(1);
    assert_eq!(damage.dirty_rects, [Rect::new(8.0, 8.0, 16.0, 16.0)]);
    let damage = scene.dispose();
    assert_eq!(damage.dirty_rects, [Rect::new(0.0, 0.0, 8.0, 8.0)]);
    assert!(scene.layer(0).is_none());
    assert_eq!(Rc::weak_count(&a), 0);
    assert_eq!(draw(&mut scene).pixmap().pixel_rgba8(2, 2), [0, 0, 0, 0]);
}

#[test]
fn removing_an_item_reports_its_area() {
    let tile = Tile::new(Rect::new(2.0, 2.0, 6.0, 6.0), [255, 0, 0, 255]);
    let item = dyn_item(&tile);
    let mut scene = RenderScene::new(GraphicsDevice::null(), SIZE);
    scene.update(3, &[item.clone()]);
    assert_eq!(
        scene.remove(&item).union_rect(),
        Some(Rect::new(2.0, 2.0, 6.0, 6.0))
    );
    assert!(!scene.invalidate(&item));
}
