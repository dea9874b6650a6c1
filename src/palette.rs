//! The 256-entry palette and its nearest-color lookup table.
//!
//! Palette channels are stored in the classic 6-bit range (0..=63) and
//! expanded to 8-bit through a fixed scale table, so palette files stay
//! compatible with VGA-era data. Index 0 is transparent by convention; the
//! palette itself stores an ordinary color there.
//!
//! The [`NearestColorTable`] is a 32×32×32 grid mapping a quantized RGB
//! coordinate (each channel right-shifted by 3) to the closest palette index.
//! It must be rebuilt whenever the palette changes; looking up against a
//! stale table gives undefined (wrong-colored, not unsafe) results.
//!
//! ## Palette files
//!
//! Palettes load from TOML:
//!
//! ```toml
//! # 6-bit channels, up to 256 entries; missing entries pad with black
//! entries = [
//!     [0, 0, 0],
//!     [63, 0, 0],
//!     [0, 63, 0],
//! ]
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaletteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("palette has {0} entries, maximum is 256")]
    TooManyEntries(usize),
    #[error("entry {index}: channel value {value} exceeds 6-bit range (0..=63)")]
    ChannelOutOfRange { index: usize, value: u8 },
}

const fn build_scale_6() -> [u8; 64] {
    // 6-bit → 8-bit expansion: replicate the top bits into the bottom so
    // 0 maps to 0 and 63 maps to 255.
    let mut table = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        table[i] = ((i << 2) | (i >> 4)) as u8;
        i += 1;
    }
    table
}

/// 6-bit → 8-bit channel expansion table.
pub const SCALE_6: [u8; 64] = build_scale_6();

/// One palette entry, channels in 0..=63.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaletteColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Ordered sequence of exactly 256 six-bit color entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [PaletteColor; 256],
}

impl Palette {
    /// Build from up to 256 entries; the remainder pads with black.
    /// Channel values must already be in the 6-bit range.
    pub fn new(colors: &[PaletteColor]) -> Result<Self, PaletteError> {
        if colors.len() > 256 {
            return Err(PaletteError::TooManyEntries(colors.len()));
        }
        for (index, c) in colors.iter().enumerate() {
            for value in [c.r, c.g, c.b] {
                if value > 63 {
                    return Err(PaletteError::ChannelOutOfRange { index, value });
                }
            }
        }
        let mut entries = [PaletteColor::default(); 256];
        entries[..colors.len()].copy_from_slice(colors);
        Ok(Self { entries })
    }

    pub fn color(&self, index: u8) -> PaletteColor {
        self.entries[index as usize]
    }

    /// Expand an entry to 8-bit `(r, g, b)` via [`SCALE_6`].
    pub fn expand(&self, index: u8) -> (u8, u8, u8) {
        let c = self.entries[index as usize];
        (
            SCALE_6[c.r as usize],
            SCALE_6[c.g as usize],
            SCALE_6[c.b as usize],
        )
    }

    /// Load a palette from a TOML file (see the module docs for the format).
    pub fn from_toml_file(path: &Path) -> Result<Self, PaletteError> {
        #[derive(Deserialize)]
        struct PaletteFile {
            entries: Vec<[u8; 3]>,
        }

        let text = std::fs::read_to_string(path)?;
        let file: PaletteFile = toml::from_str(&text)?;
        let colors: Vec<PaletteColor> = file
            .entries
            .iter()
            .map(|&[r, g, b]| PaletteColor { r, g, b })
            .collect();
        Self::new(&colors)
    }

    /// Built-in default palette: transparent black at 0, a 6×6×6 color cube
    /// at 1..=216, and a 39-step gray ramp filling the rest.
    pub fn default_vga() -> Self {
        let mut entries = [PaletteColor::default(); 256];
        const LEVELS: [u8; 6] = [0, 12, 25, 38, 50, 63];
        let mut i = 1;
        for r in LEVELS {
            for g in LEVELS {
                for b in LEVELS {
                    entries[i] = PaletteColor { r, g, b };
                    i += 1;
                }
            }
        }
        for step in 0..39 {
            let v = ((step + 1) * 63 / 40) as u8;
            entries[i] = PaletteColor { r: v, g: v, b: v };
            i += 1;
        }
        Self { entries }
    }
}

/// Perceptually weighted squared distance between two 8-bit RGB colors.
///
/// Red differences count ×3, green ×4, blue ×2: green dominates perceived
/// brightness, blue the least. Shared by the ordered-dither quantizer and the
/// nearest-table builder so round trips through both agree on "closest".
#[inline]
pub fn weighted_distance(r1: u8, g1: u8, b1: u8, r2: u8, g2: u8, b2: u8) -> i32 {
    let dr = r1 as i32 - r2 as i32;
    let dg = g1 as i32 - g2 as i32;
    let db = b1 as i32 - b2 as i32;
    3 * dr * dr + 4 * dg * dg + 2 * db * db
}

/// Precomputed nearest-palette-index lookup over a 32³ RGB grid.
///
/// Indexed by `(r >> 3, g >> 3, b >> 3)`. Owned and rebuilt by whoever owns
/// the palette; the engine only reads it.
pub struct NearestColorTable {
    data: Box<[u8]>,
}

impl NearestColorTable {
    /// Exhaustive build: for every grid cell, the palette index minimizing
    /// [`weighted_distance`] from the cell's center color `(c << 3) | 4`.
    pub fn build(palette: &Palette) -> Self {
        let mut data = vec![0u8; 32 * 32 * 32].into_boxed_slice();
        let expanded: Vec<(u8, u8, u8)> = (0..=255u8).map(|i| palette.expand(i)).collect();
        for r5 in 0..32u16 {
            for g5 in 0..32u16 {
                for b5 in 0..32u16 {
                    let (cr, cg, cb) = (
                        ((r5 << 3) | 4) as u8,
                        ((g5 << 3) | 4) as u8,
                        ((b5 << 3) | 4) as u8,
                    );
                    let mut best = 0u8;
                    let mut best_dist = i32::MAX;
                    for (i, &(pr, pg, pb)) in expanded.iter().enumerate() {
                        let d = weighted_distance(cr, cg, cb, pr, pg, pb);
                        if d < best_dist {
                            best_dist = d;
                            best = i as u8;
                        }
                    }
                    data[(r5 as usize * 32 + g5 as usize) * 32 + b5 as usize] = best;
                }
            }
        }
        Self { data }
    }

    /// Closest palette index for an 8-bit RGB color.
    #[inline]
    pub fn lookup(&self, r: u8, g: u8, b: u8) -> u8 {
        let (r5, g5, b5) = ((r >> 3) as usize, (g >> 3) as usize, (b >> 3) as usize);
        self.data[(r5 * 32 + g5) * 32 + b5]
    }
}
