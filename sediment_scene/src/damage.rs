// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Damage summaries returned from layer and scene updates.

use kurbo::Rect;

/// Regions that may look different after an update.
///
/// `Damage` is coarse: it holds the previous and new bounds of every item
/// whose drawing changed, plus the bounds of added, removed and reordered
/// items. Rectangles may overlap and are not deduplicated; it is not
/// guaranteed to be a minimal cover.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Damage {
    /// Canvas-space rectangles that should be repainted.
    pub dirty_rects: Vec<Rect>,
}

impl Damage {
    /// Returns `true` if nothing needs repainting.
    pub fn is_empty(&self) -> bool {
        self.dirty_rects.is_empty()
    }

    /// Record `rect`, ignoring empty or non-finite rectangles.
    pub fn add(&mut self, rect: Rect) {
        if rect.area() > 0.0 && rect.is_finite() {
            self.dirty_rects.push(rect);
        }
    }

    /// Record every rectangle of `other`.
    pub fn merge(&mut self, other: Self) {
        self.dirty_rects.extend(other.dirty_rects);
    }

    /// Returns the union of all damage rects.
    pub fn union_rect(&self) -> Option<Rect> {
        let mut it = self.dirty_rects.iter().copied();
        let first = it.next()?;
        Some(it.fold(first, |acc, r| acc.union(r)))
    }
}
