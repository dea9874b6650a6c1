//! Whole-buffer conversion between the three color modes.
//!
//! [`convert`] dispatches over the source/target pair: full color to indexed
//! with ordered dithering routes through [`crate::quant`]; the six remaining
//! pairs are direct per-pixel remaps.
//!
//! ## Transparency rules
//!
//! Going *into* indexed form, any zero-alpha pixel becomes index 0. Coming
//! *out* of indexed form, index 0 becomes a fully transparent pixel, but no
//! other reverse inference is made: an opaque black pixel does not become
//! index 0, and a zero-alpha gray pixel converting to full color keeps its
//! intensity.
//!
//! Grayscale intensity is the HSV value of the RGB triple (see
//! [`crate::pixel::rgb_value`]), not a luminance weighting.

use crate::buffer::{Buffer, ColorMode, Image};
use crate::palette::{NearestColorTable, Palette};
use crate::pixel::{graya, graya_a, graya_k, rgb_value, rgba, rgba_a, rgba_b, rgba_g, rgba_r};
use crate::quant;

/// Dithering method for full-color → indexed conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dither {
    /// Plain nearest-match quantization.
    #[default]
    None,
    /// 8×8 Bayer ordered dithering with the opposite-color heuristic.
    Ordered,
}

/// Convert an image to `target` mode.
///
/// Returns `None` when `target` equals the image's current mode: a no-op,
/// not an error. The caller owns the returned image.
pub fn convert(
    img: &Image,
    target: ColorMode,
    dither: Dither,
    table: &NearestColorTable,
    palette: &Palette,
) -> Option<Image> {
    if img.mode() == target {
        return None;
    }

    let converted = match (img, target) {
        (Image::Rgba(src), ColorMode::Indexed) if dither == Dither::Ordered => {
            Image::Indexed(quant::rgb_to_indexed(src, 0, 0, table, palette))
        }
        (Image::Rgba(src), ColorMode::Indexed) => Image::Indexed(rgba_to_indexed(src, table)),
        (Image::Rgba(src), ColorMode::GrayAlpha) => Image::GrayAlpha(rgba_to_gray(src)),
        (Image::GrayAlpha(src), ColorMode::Rgba) => Image::Rgba(gray_to_rgba(src)),
        (Image::GrayAlpha(src), ColorMode::Indexed) => Image::Indexed(gray_to_indexed(src)),
        (Image::Indexed(src), ColorMode::Rgba) => Image::Rgba(indexed_to_rgba(src, palette)),
        (Image::Indexed(src), ColorMode::GrayAlpha) => {
            Image::GrayAlpha(indexed_to_gray(src, palette))
        }
        // Same-mode pairs are handled by the early return above.
        _ => unreachable!("mode pair already covered"),
    };

    Some(converted)
}

fn map<A: Copy + Default, B: Copy + Default>(
    src: &Buffer<A>,
    f: impl Fn(A) -> B,
) -> Buffer<B> {
    let mut dst = Buffer::new(src.width(), src.height());
    for (out, &px) in dst.pixels_mut().iter_mut().zip(src.pixels()) {
        *out = f(px);
    }
    dst
}

fn rgba_to_gray(src: &Buffer<u32>) -> Buffer<u16> {
    map(src, |c| {
        graya(rgb_value(rgba_r(c), rgba_g(c), rgba_b(c)), rgba_a(c))
    })
}

fn rgba_to_indexed(src: &Buffer<u32>, table: &NearestColorTable) -> Buffer<u8> {
    map(src, |c| {
        if rgba_a(c) == 0 {
            0
        } else {
            table.lookup(rgba_r(c), rgba_g(c), rgba_b(c))
        }
    })
}

fn gray_to_rgba(src: &Buffer<u16>) -> Buffer<u32> {
    map(src, |c| {
        let k = graya_k(c);
        rgba(k, k, k, graya_a(c))
    })
}

fn gray_to_indexed(src: &Buffer<u16>) -> Buffer<u8> {
    // The raw intensity byte doubles as the palette index; gray ramps are
    // conventionally stored as identity palettes.
    map(src, |c| if graya_a(c) == 0 { 0 } else { graya_k(c) })
}

fn indexed_to_rgba(src: &Buffer<u8>, palette: &Palette) -> Buffer<u32> {
    map(src, |i| {
        if i == 0 {
            rgba(0, 0, 0, 0)
        } else {
            let (r, g, b) = palette.expand(i);
            rgba(r, g, b, 255)
        }
    })
}

fn indexed_to_gray(src: &Buffer<u8>, palette: &Palette) -> Buffer<u16> {
    map(src, |i| {
        if i == 0 {
            graya(0, 0)
        } else {
            let (r, g, b) = palette.expand(i);
            graya(rgb_value(r, g, b), 255)
        }
    })
}
