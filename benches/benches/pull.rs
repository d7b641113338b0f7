// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pull and draw cost with and without render caches.

use std::rc::Rc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kurbo::{Affine, Rect, Size};
use peniko::{Brush, Color};
use sediment_imaging::{GraphicsDevice, NullCanvas, TransformOperator};
use sediment_imaging_ref::{RefCanvas, RefSurfaceFactory};
use sediment_render::{
    GraphicsContext2D, RenderCacheOptions, RenderError, RenderNodeProcessor, RenderTree,
    Renderable,
};
use sediment_scene::RenderScene;

const SIZE: Size = Size::new(256.0, 256.0);

#[derive(Debug)]
struct Cells(u32);

impl Renderable for Cells {
    fn render(&self, ctx: &mut GraphicsContext2D<'_>) -> Result<(), RenderError> {
        let fill = Brush::Solid(Color::from_rgba8(40, 80, 160, 255));
        for i in 0..self.0 * self.0 {
            let (x, y) = (f64::from(i % self.0) * 8.0, f64::from(i / self.0) * 8.0);
            let mut cell =
                ctx.push_transform(Affine::translate((x, y)), TransformOperator::Prepend);
            let mut faded = cell.push_opacity(0.75);
            faded.draw_ellipse(Rect::new(0.0, 0.0, 6.0, 6.0), Some(&fill), None);
        }
        Ok(())
    }
}

fn bench_pull(c: &mut Criterion) {
    let mut group = c.benchmark_group("sediment_pull");
    group.sample_size(30);

    for n in [8_u32, 32] {
        group.bench_function(format!("pull_null_canvas(n={n})"), |b| {
            let mut tree = RenderTree::new();
            let mut ctx = GraphicsContext2D::new(&mut tree, SIZE);
            Cells(n).render(&mut ctx).unwrap();
            ctx.finish();
            let device = GraphicsDevice::null();
            let root = tree.root();
            let mut canvas = NullCanvas::new(256, 256);
            b.iter(|| {
                RenderNodeProcessor::new(&mut tree, &device, false).render(&mut canvas, root);
                black_box(&canvas);
            });
        });

        for (label, options) in [
            ("uncached", RenderCacheOptions::DISABLED),
            ("cached", RenderCacheOptions::DEFAULT),
        ] {
            group.bench_function(format!("scene_{label}(n={n})"), |b| {
                let device = GraphicsDevice::new(RefSurfaceFactory::new());
                let mut scene = RenderScene::with_cache_options(device, SIZE, options);
                let item: Rc<dyn Renderable> = Rc::new(Cells(n));
                scene.update(0, &[item.clone()]);
                let mut canvas = RefCanvas::new(256, 256);
                b.iter(|| {
                    scene.render(&mut canvas);
                    black_box(canvas.take_events());
                });
                drop(item);
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_pull);
criterion_main!(benches);
