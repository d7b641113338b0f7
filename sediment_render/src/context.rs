// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::operation::BoxedOperation;

/// Input of one node while it is being processed.
///
/// Holds the concatenated operations of the node's children. Processing may
/// turn off render caching for the node, which resets its render count.
#[derive(Debug)]
pub struct RenderNodeContext {
    input: Vec<BoxedOperation>,
    is_render_cache_enabled: bool,
}

impl RenderNodeContext {
    /// Context for a node whose children produced `input`.
    pub fn new(input: Vec<BoxedOperation>) -> Self {
        Self {
            input,
            is_render_cache_enabled: true,
        }
    }

    /// Operations produced by the children.
    pub fn input(&self) -> &[BoxedOperation] {
        &self.input
    }

    /// Move the input out of the context.
    pub fn take_input(&mut self) -> Vec<BoxedOperation> {
        std::mem::take(&mut self.input)
    }

    /// Whether the node's render count keeps growing after this pull.
    pub fn is_render_cache_enabled(&self) -> bool {
        self.is_render_cache_enabled
    }

    /// Enable or disable render counting for the node.
    pub fn set_render_cache_enabled(&mut self, enabled: bool) {
        self.is_render_cache_enabled = enabled;
    }
}
