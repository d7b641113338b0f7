// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Replay cost for cold, unchanged and partially changed call sequences.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use kurbo::{Affine, Rect, Size};
use peniko::{Brush, Color};
use sediment_imaging::TransformOperator;
use sediment_render::{GraphicsContext2D, RenderTree};

const SIZE: Size = Size::new(1024.0, 1024.0);

/// A grid of `n * n` cells, each a translated group with a filled and a
/// faded rectangle.
fn grid(ctx: &mut GraphicsContext2D<'_>, n: u32, changed: Option<u32>) {
    let base = Brush::Solid(Color::from_rgba8(40, 80, 160, 255));
    let accent = Brush::Solid(Color::from_rgba8(220, 60, 60, 255));
    for i in 0..n * n {
        let (x, y) = (f64::from(i % n) * 12.0, f64::from(i / n) * 12.0);
        let mut cell = ctx.push_transform(Affine::translate((x, y)), TransformOperator::Prepend);
        let fill = if changed == Some(i) { &accent } else { &base };
        cell.draw_rectangle(Rect::new(0.0, 0.0, 10.0, 10.0), Some(fill), None);
        let mut faded = cell.push_opacity(0.5);
        faded.draw_ellipse(Rect::new(2.0, 2.0, 8.0, 8.0), Some(&accent), None);
    }
}

fn replayed(n: u32) -> RenderTree {
    let mut tree = RenderTree::new();
    let mut ctx = GraphicsContext2D::new(&mut tree, SIZE);
    grid(&mut ctx, n, None);
    ctx.finish();
    tree
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("sediment_replay");
    group.sample_size(50);

    for n in [8_u32, 32] {
        group.bench_function(format!("cold(n={n})"), |b| {
            b.iter_batched(
                RenderTree::new,
                |mut tree| {
                    let mut ctx = GraphicsContext2D::new(&mut tree, SIZE);
                    grid(&mut ctx, n, None);
                    black_box(ctx.finish());
                    tree
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(format!("unchanged(n={n})"), |b| {
            let mut tree = replayed(n);
            b.iter(|| {
                let mut ctx = GraphicsContext2D::new(&mut tree, SIZE);
                grid(&mut ctx, n, None);
                black_box(ctx.finish())
            });
        });

        group.bench_function(format!("one_change(n={n})"), |b| {
            let mut tree = replayed(n);
            let mut flip = 0_u32;
            b.iter(|| {
                flip ^= 1;
                let mut ctx = GraphicsContext2D::new(&mut tree, SIZE);
                grid(&mut ctx, n, (flip == 1).then_some(n));
                black_box(ctx.finish())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_replay);
criterion_main!(benches);
