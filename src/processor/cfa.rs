//! Bayer color filter array layout.
//!
//! `filters` packs the color of an 8×2 tile into 32 bits, two bits per
//! site. The four supported patterns repeat a single 2×2 byte.

pub const PATTERN_RGGB: u8 = 0x94;
pub const PATTERN_BGGR: u8 = 0x16;
pub const PATTERN_GRBG: u8 = 0x61;
pub const PATTERN_GBRG: u8 = 0x49;

/// Expand a 2×2 pattern byte into a full `filters` word.
pub(crate) fn filters_from_pattern(pattern: u8) -> Option<u32> {
    match pattern {
        PATTERN_RGGB | PATTERN_BGGR | PATTERN_GRBG | PATTERN_GBRG => {
            Some(u32::from_ne_bytes([pattern; 4]))
        }
        _ => None,
    }
}

pub(crate) fn filters_from_name(name: &str) -> Option<u32> {
    let pattern = match name.to_ascii_uppercase().as_str() {
        "RGGB" => PATTERN_RGGB,
        "BGGR" => PATTERN_BGGR,
        "GRBG" => PATTERN_GRBG,
        "GBRG" => PATTERN_GBRG,
        _ => return None,
    };
    filters_from_pattern(pattern)
}

/// Color index (0 R, 1 G, 2 B, 3 second G) at a mosaic site.
#[inline]
pub(crate) fn fcol(filters: u32, row: usize, col: usize) -> usize {
    ((filters >> ((((row << 1) & 14) | (col & 1)) << 1)) & 3) as usize
}

/// Re-anchor `filters` so that site (0, 0) is raw site (`top`, `left`).
pub(crate) fn shift_filters(filters: u32, top: usize, left: usize) -> u32 {
    let mut shifted = 0;
    for row in 0..8 {
        for col in 0..2 {
            let color = fcol(filters, row + top, col + left) as u32;
            shifted |= color << ((((row << 1) & 14) | (col & 1)) << 1);
        }
    }
    shifted
}
