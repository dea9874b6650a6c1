//! Shared test fixtures: palettes and buffers used across module tests.

use crate::buffer::Buffer;
use crate::palette::{NearestColorTable, Palette, PaletteColor};

/// Five well-separated colors: black, red, green, blue, white. Every entry
/// is its own unique nearest match.
pub fn rgb_palette() -> (Palette, NearestColorTable) {
    let pal = Palette::new(&[
        PaletteColor { r: 0, g: 0, b: 0 },
        PaletteColor { r: 63, g: 0, b: 0 },
        PaletteColor { r: 0, g: 63, b: 0 },
        PaletteColor { r: 0, g: 0, b: 63 },
        PaletteColor { r: 63, g: 63, b: 63 },
    ])
    .unwrap();
    let table = NearestColorTable::build(&pal);
    (pal, table)
}

/// All 256 entries form a gray ramp (index i → 6-bit level i / 4), so raw
/// indices and gray levels move together.
pub fn gray_ramp_palette() -> (Palette, NearestColorTable) {
    let mut colors = Vec::with_capacity(256);
    for i in 0..=255u16 {
        let v = (i / 4) as u8;
        colors.push(PaletteColor { r: v, g: v, b: v });
    }
    let pal = Palette::new(&colors).unwrap();
    let table = NearestColorTable::build(&pal);
    (pal, table)
}

/// `width × height` full-color buffer where every pixel encodes its own
/// coordinates, handy for byte-identity assertions.
pub fn coordinate_image(width: u32, height: u32) -> Buffer<u32> {
    let mut buf = Buffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            buf.put(
                x,
                y,
                crate::pixel::rgba(x as u8, y as u8, x as u8 ^ y as u8, 255),
            );
        }
    }
    buf
}
