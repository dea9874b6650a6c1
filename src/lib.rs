//! # rasterfx
//!
//! A palette-aware raster engine for indexed pixel art: convert pixel
//! buffers between color models (full color, gray+alpha, palette-indexed)
//! with perceptually-aware ordered dithering, and run arbitrary-size
//! convolution kernels over them with per-channel targeting,
//! transparency-aware normalization, and tiled or clamped edges.
//!
//! # Architecture: Engine + Stock + CLI
//!
//! The engine is three independent pieces sharing the palette machinery:
//!
//! ```text
//! 1. Convert   Image ⇄ Image         (color-model remaps, ordered dither)
//! 2. Kernels   text stock → registry (parse, validate, merge sources)
//! 3. Filter    kernel × Image → Image (generic convolution, row-parallel)
//! ```
//!
//! The split exists for three reasons:
//!
//! - **Snapshot semantics**: a filter pass borrows an immutable
//!   [`filter::FilterContext`]; nothing the pass reads can change mid-pass,
//!   and the borrow checker enforces that rather than convention.
//! - **Testability**: conversion, parsing, and convolution are pure
//!   functions over in-memory buffers; unit tests never touch the
//!   filesystem except where the registry reads stock files.
//! - **Parallelism**: rows write disjoint destination slices, so the filter
//!   driver fans rows out with rayon without locking.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pixel`] | Packed per-mode pixel encodings and channel accessors |
//! | [`buffer`] | Row-addressable pixel storage, the `Image` enum, boundary sampling |
//! | [`palette`] | 256-entry 6-bit palette, nearest-color table, palette files |
//! | [`mask`] | Bit-packed region masks with per-row cursors |
//! | [`convert`] | Color-model conversion between the three modes |
//! | [`quant`] | Ordered-dither quantization (Bayer 8×8, opposite-color heuristic) |
//! | [`kernel`] | Kernel type, definition-format lexer/parser, stock registry |
//! | [`filter`] | Generic convolution engine and the row-parallel driver |
//! | [`config`] | Optional `rasterfx.toml` for the CLI |
//!
//! # Design Decisions
//!
//! ## One Convolution, Three Formats
//!
//! The three per-format filter paths share one row algorithm parameterized
//! by a [`filter::FormatOps`] descriptor. Each format implements only the
//! parts that actually differ: what a "channel" is, how transparency affects
//! normalization, and when to re-quantize through the palette.
//!
//! ## Fixed-Point Weights
//!
//! Kernel weights are integers scaled by [`kernel::PRECISION`] (256). The
//! accumulators are `i64` per channel, which keeps the largest supported
//! kernels (32×32) exact for any weight magnitude a stock file can express.
//!
//! ## 6-Bit Palettes
//!
//! Palette channels live in 0..=63 and expand through a fixed scale table,
//! keeping palette files interchangeable with VGA-era art tools. Index 0 is
//! transparent by convention; the conversion rules implement that, the
//! palette itself does not.
//!
//! ## Sentinel Results, Not Exceptions
//!
//! Same-format conversion returns `None` (a no-op, not an error). Malformed
//! stock records are discarded record-by-record; unreadable stock files
//! contribute zero records. Filtering with no active kernel is the identity
//! pass. Errors that callers must act on (bad palette file, bad config) are
//! `thiserror` enums.

pub mod buffer;
pub mod config;
pub mod convert;
pub mod filter;
pub mod kernel;
pub mod mask;
pub mod palette;
pub mod pixel;
pub mod quant;

#[cfg(test)]
pub(crate) mod test_helpers;
