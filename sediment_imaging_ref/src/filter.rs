// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU implementations of the filter primitives.

use kurbo::{Affine, Point};
use sediment_imaging::FilterDesc;

use crate::pixmap::{Pixmap, Premul, premultiply, scale, src_over};

/// Apply `desc` to a layer, with lengths scaled by `transform`.
pub(crate) fn apply(desc: &FilterDesc, src: &Pixmap, transform: Affine) -> Pixmap {
    let [a, b, c, d, _, _] = transform.as_coeffs();
    let linear = Affine::new([a, b, c, d, 0.0, 0.0]);
    let sx = a.hypot(b);
    let sy = c.hypot(d);
    match *desc {
        FilterDesc::Flood { color } => {
            let mut out = Pixmap::new(src.width(), src.height());
            out.fill(premultiply(color));
            out
        }
        FilterDesc::Blur {
            std_deviation_x,
            std_deviation_y,
        } => blur(
            src,
            f64::from(std_deviation_x) * sx,
            f64::from(std_deviation_y) * sy,
        ),
        FilterDesc::Offset { dx, dy } => {
            let v = linear * Point::new(f64::from(dx), f64::from(dy));
            shift(src, v.x, v.y)
        }
        FilterDesc::DropShadow {
            dx,
            dy,
            std_deviation_x,
            std_deviation_y,
            color,
        } => {
            let v = linear * Point::new(f64::from(dx), f64::from(dy));
            let tint = premultiply(color);
            let mut shadow = shift(src, v.x, v.y);
            for px in shadow.data_mut() {
                *px = scale(tint, px[3]);
            }
            let mut out = blur(
                &shadow,
                f64::from(std_deviation_x) * sx,
                f64::from(std_deviation_y) * sy,
            );
            for (dst, s) in out.data_mut().iter_mut().zip(src.data()) {
                *dst = src_over(*dst, *s);
            }
            out
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "offsets are rounded device pixels well inside i64"
)]
fn shift(src: &Pixmap, dx: f64, dy: f64) -> Pixmap {
    let (dx, dy) = (dx.round() as i64, dy.round() as i64);
    let mut out = Pixmap::new(src.width(), src.height());
    for y in 0..src.height() {
        for x in 0..src.width() {
            let (tx, ty) = (i64::from(x) + dx, i64::from(y) + dy);
            if let (Ok(tx), Ok(ty)) = (u32::try_from(tx), u32::try_from(ty)) {
                out.set(tx, ty, src.pixel(x, y));
            }
        }
    }
    out
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "kernel radius is a small positive pixel count"
)]
fn kernel(sigma: f64) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    let mut weights: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - radius as f64;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights.into_iter().map(|w| w as f32).collect()
}

fn blur(src: &Pixmap, sigma_x: f64, sigma_y: f64) -> Pixmap {
    let horizontal = if sigma_x > 0.0 {
        convolve(src, &kernel(sigma_x), true)
    } else {
        src.clone()
    };
    if sigma_y > 0.0 {
        convolve(&horizontal, &kernel(sigma_y), false)
    } else {
        horizontal
    }
}

#[allow(
    clippy::cast_possible_wrap,
    reason = "pixmap dimensions and kernel sizes fit in i64"
)]
fn convolve(src: &Pixmap, kernel: &[f32], horizontal: bool) -> Pixmap {
    let radius = (kernel.len() / 2) as i64;
    let mut out = Pixmap::new(src.width(), src.height());
    for y in 0..src.height() {
        for x in 0..src.width() {
            let mut acc: Premul = [0.0; 4];
            for (k, w) in kernel.iter().enumerate() {
                let o = k as i64 - radius;
                let (sx, sy) = if horizontal {
                    (i64::from(x) + o, i64::from(y))
                } else {
                    (i64::from(x), i64::from(y) + o)
                };
                let (Ok(sx), Ok(sy)) = (u32::try_from(sx), u32::try_from(sy)) else {
                    continue;
                };
                let p = src.pixel(sx, sy);
                for ch in 0..4 {
                    acc[ch] += p[ch] * w;
                }
            }
            out.set(x, y, acc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use peniko::Color;

    fn dot() -> Pixmap {
        let mut p = Pixmap::new(9, 9);
        p.set(4, 4, [1.0, 1.0, 1.0, 1.0]);
        p
    }

    #[test]
    fn offset_scales_with_transform() {
        let out = apply(&FilterDesc::offset(1.0, 0.0), &dot(), Affine::scale(2.0));
        assert_eq!(out.pixel(6, 4), [1.0; 4]);
        assert_eq!(out.pixel(4, 4), [0.0; 4]);
    }

    #[test]
    fn blur_preserves_energy_away_from_edges() {
        let out = apply(&FilterDesc::blur(1.0), &dot(), Affine::IDENTITY);
        let total: f32 = out.data().iter().map(|p| p[3]).sum();
        assert!((total - 1.0).abs() < 1e-3, "total alpha {total}");
        assert!(out.pixel(4, 4)[3] < 1.0);
        assert!(out.pixel(5, 4)[3] > 0.0);
    }

    #[test]
    fn flood_ignores_source() {
        let out = apply(
            &FilterDesc::flood(Color::from_rgba8(0, 0, 255, 255)),
            &dot(),
            Affine::IDENTITY,
        );
        assert_eq!(out.pixel(0, 0), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn drop_shadow_keeps_source_on_top() {
        let out = apply(
            &FilterDesc::drop_shadow(2.0, 0.0, 0.0, Color::from_rgba8(0, 0, 0, 255)),
            &dot(),
            Affine::IDENTITY,
        );
        assert_eq!(out.pixel(4, 4), [1.0; 4]);
        assert_eq!(out.pixel(6, 4), [0.0, 0.0, 0.0, 1.0]);
    }
}
