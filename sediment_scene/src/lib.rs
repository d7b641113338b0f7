// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sediment Scene: layered items over persistent render trees.
//!
//! A [`RenderScene`] holds one [`RenderLayer`] per z-index. A layer keeps a
//! [`sediment_render::RenderTree`] for every item it was given, keyed by the
//! item's identity rather than its value. Items are replayed only when they
//! are new or were invalidated, so a static item costs nothing to update and,
//! once its render caches kick in, one surface blit to draw.
//!
//! Updates return [`Damage`]: the old and new bounds of everything that may
//! look different.
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use kurbo::{Point, Rect, Size};
//! use peniko::{Brush, Color};
//! use sediment_imaging::{GraphicsDevice, NullCanvas};
//! use sediment_render::{GraphicsContext2D, RenderError, Renderable};
//! use sediment_scene::RenderScene;
//!
//! struct Badge;
//!
//! impl Renderable for Badge {
//!     fn render(&self, ctx: &mut GraphicsContext2D<'_>) -> Result<(), RenderError> {
//!         let fill = Brush::Solid(Color::from_rgba8(0, 128, 255, 255));
//!         ctx.draw_ellipse(Rect::new(4.0, 4.0, 20.0, 20.0), Some(&fill), None);
//!         Ok(())
//!     }
//! }
//!
//! let badge: Rc<dyn Renderable> = Rc::new(Badge);
//! let mut scene = RenderScene::new(GraphicsDevice::null(), Size::new(64.0, 64.0));
//!
//! let damage = scene.update(0, &[badge.clone()]);
//! assert_eq!(damage.union_rect(), Some(Rect::new(4.0, 4.0, 20.0, 20.0)));
//! // Nothing was invalidated, so the second update replays nothing.
//! assert!(scene.update(0, &[badge.clone()]).is_empty());
//!
//! scene.render(&mut NullCanvas::new(64, 64));
//! assert!(scene.hit_test(Point::new(12.0, 12.0)).is_some());
//! assert!(scene.hit_test(Point::new(5.0, 5.0)).is_none());
//! ```

mod damage;
mod layer;
mod scene;

pub use damage::Damage;
pub use layer::RenderLayer;
pub use scene::RenderScene;
