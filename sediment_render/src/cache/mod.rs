// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render caches.
//!
//! Every node counts how many consecutive frames it was pulled without
//! changing. Once a node and its whole subtree have been stable long enough,
//! [`RenderNodeCacheContext::make_cache`] rasterizes the node's operations
//! into surfaces, and later pulls draw those surfaces instead of visiting the
//! subtree. Any change inside the subtree invalidates the cache.
//!
//! ```text
//!   Uncached --pull--> Counting --count >= threshold, eligible--> Cached
//!                         ^                                          |
//!                         +------------- change in subtree ---------+
//! ```

mod context;
mod options;

pub use context::RenderNodeCacheContext;
pub use options::{RenderCacheOptions, RenderCacheRules};

use kurbo::Rect;
use sediment_imaging::Surface;
use smallvec::SmallVec;

use crate::operation::{BoxedOperation, CachedSurfaceOperation};
use crate::tree::NodeId;

/// Lifecycle of a node's render cache.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CacheState {
    /// Never pulled.
    #[default]
    Uncached,
    /// Pulled; counting stable frames.
    Counting,
    /// Holding rasterized surfaces.
    Cached,
}

/// Per-node cache bookkeeping and storage.
#[derive(Debug, Default)]
pub struct RenderNodeCache {
    state: CacheState,
    render_count: u32,
    entries: SmallVec<[(Surface, Rect); 1]>,
    captured_children: Option<Vec<NodeId>>,
}

impl RenderNodeCache {
    /// Current state.
    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Consecutive stable pulls since the last invalidation.
    pub fn render_count(&self) -> u32 {
        self.render_count
    }

    /// Returns `true` if surfaces are stored.
    pub fn is_cached(&self) -> bool {
        self.state == CacheState::Cached
    }

    /// Stored surfaces and the bounds each one covers.
    pub fn entries(&self) -> &[(Surface, Rect)] {
        &self.entries
    }

    /// Count one more stable pull.
    pub fn increment_render_count(&mut self) {
        self.render_count = self.render_count.saturating_add(1);
        self.start_counting();
    }

    /// Overwrite the render count.
    pub fn report_render_count(&mut self, count: u32) {
        self.render_count = count;
        self.start_counting();
    }

    fn start_counting(&mut self) {
        if self.state == CacheState::Uncached {
            self.state = CacheState::Counting;
        }
    }

    /// Drop stored surfaces and restart counting.
    pub fn invalidate(&mut self) {
        if self.is_cached() {
            log::trace!("render cache invalidated ({} surfaces)", self.entries.len());
        }
        self.entries.clear();
        self.render_count = 0;
        if self.state == CacheState::Cached {
            self.state = CacheState::Counting;
        }
    }

    /// Store rasterized surfaces.
    pub fn store(&mut self, entries: impl IntoIterator<Item = (Surface, Rect)>) {
        self.entries = entries.into_iter().collect();
        self.state = CacheState::Cached;
    }

    /// Remember the children seen at the last validation.
    pub fn capture_children(&mut self, children: &[NodeId]) {
        match &mut self.captured_children {
            Some(captured) => {
                captured.clear();
                captured.extend_from_slice(children);
            }
            None => self.captured_children = Some(children.to_vec()),
        }
    }

    /// Children captured at the last validation, if any.
    pub fn captured_children(&self) -> Option<&[NodeId]> {
        self.captured_children.as_deref()
    }

    /// Returns `true` if `children` match the captured ones in identity and order.
    pub fn same_children(&self, children: &[NodeId]) -> bool {
        self.captured_children.as_deref() == Some(children)
    }

    /// Operations drawing the stored surfaces.
    pub(crate) fn cached_operations(&self) -> Vec<BoxedOperation> {
        self.entries
            .iter()
            .map(|(surface, bounds)| {
                Box::new(CachedSurfaceOperation::new(surface.clone(), *bounds)) as BoxedOperation
            })
            .collect()
    }
}
