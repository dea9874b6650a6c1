//! Ordered-dither quantization from full color to palette indices.
//!
//! Classic Heckbert image quantization with Gary Oberbrunner's Bayer-matrix
//! ordered dither. Plain nearest-match quantization bands badly when the
//! palette is sparse; this pass dithers each pixel between its nearest
//! palette entry and a second candidate found by reflecting the true color
//! through the nearest match ("the opposite color"). How often the opposite
//! wins is proportional to how far the true color sits from its nearest
//! match relative to the gap between the two candidates.
//!
//! The triangulation is approximate: the opposite color's nearest match is
//! not necessarily on the line through the true color, so in the worst case
//! the true color can be closer to the opposite candidate than to its own
//! nearest match. The 0..=63 threshold clamp bounds the damage.

use crate::buffer::Buffer;
use crate::palette::{NearestColorTable, Palette, weighted_distance};
use crate::pixel::{rgba_a, rgba_b, rgba_g, rgba_r};

/// 8×8 Bayer threshold matrix, values 0..=63. Indexed `[x & 7][y & 7]`.
const PATTERN: [[i32; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Quantize a full-color buffer to palette indices with ordered dithering.
///
/// `offset_x`/`offset_y` shift the threshold matrix, so a sub-region
/// quantized at its own offset dithers identically to the same region
/// quantized as part of the whole image.
///
/// Pixels with zero alpha always map to index 0.
pub fn rgb_to_indexed(
    src: &Buffer<u32>,
    offset_x: i32,
    offset_y: i32,
    table: &NearestColorTable,
    palette: &Palette,
) -> Buffer<u8> {
    let mut dst: Buffer<u8> = Buffer::new(src.width(), src.height());

    for y in 0..src.height() {
        for x in 0..src.width() {
            let c = src.get(x, y);
            let (r, g, b, a) = (rgba_r(c), rgba_g(c), rgba_b(c), rgba_a(c));

            if a == 0 {
                dst.put(x, y, 0);
                continue;
            }

            let mut nearest = table.lookup(r, g, b);
            let (nr, ng, nb) = palette.expand(nearest);

            // Color as far from (r, g, b) as the nearest match, but on the
            // other side of it.
            let opp_r = (2 * r as i32 - nr as i32).clamp(0, 255) as u8;
            let opp_g = (2 * g as i32 - ng as i32).clamp(0, 255) as u8;
            let opp_b = (2 * b as i32 - nb as i32).clamp(0, 255) as u8;
            let opp_nearest = table.lookup(opp_r, opp_g, opp_b);

            // Same candidate on both sides: no ambiguity, no dithering.
            if opp_nearest != nearest {
                let (or, og, ob) = palette.expand(opp_nearest);
                let gap = weighted_distance(nr, ng, nb, or, og, ob);
                if gap != 0 {
                    let t = (64 * weighted_distance(r, g, b, nr, ng, nb) / gap).min(63);
                    let px = ((x as i32 + offset_x) & 7) as usize;
                    let py = ((y as i32 + offset_y) & 7) as usize;
                    if PATTERN[px][py] < t {
                        nearest = opp_nearest;
                    }
                }
            }

            dst.put(x, y, nearest);
        }
    }

    dst
}
