// Copyright 2025 the Sediment Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by replay, pulls and rasterization.

use thiserror::Error;

/// Errors reported by the render core.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// A draw call referenced a disposed source or an invalid node.
    ///
    /// The persistent tree is left untouched.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The backend could not provide an offscreen surface.
    ///
    /// The affected subtree draws nothing for this frame.
    #[error("surface unavailable for a {width}x{height} target")]
    SurfaceUnavailable {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
    /// A pop asked for a depth deeper than what is currently pushed.
    #[error("cannot pop to depth {requested}: only {depth} scopes are pushed")]
    UnbalancedPop {
        /// Depth the caller asked to return to.
        requested: usize,
        /// Depth at the time of the call.
        depth: usize,
    },
    /// An item failed to replay its draw calls.
    #[error("item failed to render: {0}")]
    Item(String),
}
