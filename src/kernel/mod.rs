//! Convolution kernels: the data type, the text format, and the registry.
//!
//! A kernel is a small integer weight matrix in fixed-point units
//! ([`PRECISION`] per 1.0), plus a divisor, a bias, and a default set of
//! target channels. Kernels come from whitespace-delimited text records:
//!
//! ```text
//! # name  w h  cx cy  { w*h weights }  divisor  bias  targets
//! blur3   3 3  1 1    { 1 1 1
//!                       1 1 1
//!                       1 1 1 }        auto     auto  rgba
//! ```
//!
//! `auto` resolves the divisor and bias from the weight sum (see
//! [`parse`]); explicit values override. Target letters `r g b a` are
//! case-insensitive; unknown letters are ignored.
//!
//! The module is split into:
//! - [`lexer`]: whitespace/brace tokenizer with explicit end-of-input
//! - [`parse`]: record grammar, auto resolution, per-record error recovery
//! - [`registry`]: insertion-ordered storage, source search order, reload

pub mod lexer;
pub mod parse;
pub mod registry;

pub use registry::{KernelRegistry, KernelSources};

use thiserror::Error;

/// Fixed-point scale for kernel weights: a textual weight of `1.0` is stored
/// as `256`. Accumulators are `i64`, so the safe envelope is generous: with
/// 32×32 kernels and 8-bit samples, per-channel sums stay exact for any
/// total weight magnitude below 2^55 / 255.
pub const PRECISION: i32 = 256;

/// Maximum kernel width/height accepted anywhere.
pub const MAX_DIM: u32 = 32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KernelError {
    #[error("kernel dimensions {0}x{1} outside 1..=32")]
    BadDimensions(u32, u32),
    #[error("kernel center ({0}, {1}) outside the matrix")]
    BadCenter(u32, u32),
    #[error("expected {expected} weights, got {got}")]
    WeightCount { expected: usize, got: usize },
}

/// Channels a filter pass writes. Disabled channels copy the center pixel.
///
/// Gray buffers treat any of `r`/`g`/`b` as targeting the intensity channel.
/// `index` selects raw-index convolution for indexed buffers; it is never set
/// by kernel files (it depends on what the caller is editing, not on the
/// kernel) and takes precedence over the color channels when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Target {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    /// The alpha channel, in both full-color and gray buffers.
    pub a: bool,
    pub index: bool,
}

impl Target {
    pub const RGBA: Target = Target {
        r: true,
        g: true,
        b: true,
        a: true,
        index: false,
    };

    pub const RGB: Target = Target {
        r: true,
        g: true,
        b: true,
        a: false,
        index: false,
    };

    pub const INDEX: Target = Target {
        r: false,
        g: false,
        b: false,
        a: false,
        index: true,
    };
}

/// A named convolution kernel with fixed-point weights.
///
/// Owned by a [`KernelRegistry`] (or standalone when built directly). The
/// weight array is row-major, `width × height`, each entry scaled by
/// [`PRECISION`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvKernel {
    name: String,
    width: u32,
    height: u32,
    cx: u32,
    cy: u32,
    weights: Vec<i32>,
    div: i32,
    bias: i32,
    default_target: Target,
}

impl ConvKernel {
    /// Validated construction. Dimensions must be in `1..=32`, the center
    /// inside the matrix, and the weight count exactly `width * height`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        cx: u32,
        cy: u32,
        weights: Vec<i32>,
        div: i32,
        bias: i32,
        default_target: Target,
    ) -> Result<Self, KernelError> {
        if !(1..=MAX_DIM).contains(&width) || !(1..=MAX_DIM).contains(&height) {
            return Err(KernelError::BadDimensions(width, height));
        }
        if cx >= width || cy >= height {
            return Err(KernelError::BadCenter(cx, cy));
        }
        let expected = width as usize * height as usize;
        if weights.len() != expected {
            return Err(KernelError::WeightCount {
                expected,
                got: weights.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            width,
            height,
            cx,
            cy,
            weights,
            div,
            bias,
            default_target,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn center(&self) -> (u32, u32) {
        (self.cx, self.cy)
    }

    /// Fixed-point weight at `(dx, dy)`, row-major.
    #[inline]
    pub fn weight(&self, dx: u32, dy: u32) -> i32 {
        self.weights[(dy * self.width + dx) as usize]
    }

    pub fn weights(&self) -> &[i32] {
        &self.weights
    }

    pub fn div(&self) -> i32 {
        self.div
    }

    pub fn bias(&self) -> i32 {
        self.bias
    }

    pub fn default_target(&self) -> Target {
        self.default_target
    }
}
