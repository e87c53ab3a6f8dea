//! Development stages run by `process`.
//!
//! Each stage works in place on the 4-channel working image. The mosaic
//! color of a site is given by [`cfa::fcol`]; channel 3 is never produced
//! for the three-color patterns supported here.

use imgref::ImgVec;

use crate::error::{RawError, Result};
use crate::info::ColorData;
use crate::params::{OutputColor, ProcessingParams};

use super::cfa;

/// Working image: one `[R, G, B, G2]` sample set per pixel.
pub(crate) type Image = ImgVec<[u16; 4]>;

/// Number of histogram bins per channel (values are binned `>> 3`).
pub(crate) const HISTOGRAM_BINS: usize = 0x2000;

/// Per-bin counts for the first three channels.
pub(crate) type Histogram = Vec<[u32; 4]>;

/// Copy the visible mosaic into a working image, binning 2×2 cells into one
/// pixel when `shrink` is set.
pub(crate) fn raw_to_image(
    raw: &ImgVec<u16>,
    filters: u32,
    left: usize,
    top: usize,
    width: usize,
    height: usize,
    shrink: bool,
) -> Result<Image> {
    let shift = shrink as usize;
    let iwidth = (width + shift) >> shift;
    let iheight = (height + shift) >> shift;
    let mut buf = Vec::new();
    buf.try_reserve_exact(iwidth * iheight)
        .map_err(|_| RawError::OutOfMemory("raw2image()"))?;
    buf.resize(iwidth * iheight, [0u16; 4]);

    let lines = raw.buf().chunks_exact(raw.width().max(1));
    for (row, line) in lines.skip(top).take(height).enumerate() {
        let out_row = (row >> shift) * iwidth;
        for (col, &value) in line[left..left + width].iter().enumerate() {
            let c = cfa::fcol(filters, row, col);
            buf[out_row + (col >> shift)][c] = value;
        }
    }
    Ok(ImgVec::new(buf, iwidth, iheight))
}

/// Subtract `black` from every channel, saturating at zero.
pub(crate) fn subtract_black(image: &mut Image, black: u16) {
    if black == 0 {
        return;
    }
    for px in image.buf_mut().iter_mut() {
        for v in px.iter_mut() {
            *v = v.saturating_sub(black);
        }
    }
}

/// Largest sample in the working image.
pub(crate) fn data_maximum(image: &Image) -> u16 {
    image
        .buf()
        .iter()
        .flat_map(|px| px.iter().copied())
        .max()
        .unwrap_or(0)
}

/// Apply white balance and scale to the full 16-bit range.
///
/// Multipliers come from the user, then the camera (when asked for), then
/// the daylight defaults. With highlight mode 0 they are normalized so the
/// smallest is 1, which clips highlights; otherwise the largest is 1.
/// Returns the level at which the first channel saturates.
pub(crate) fn scale_colors(image: &mut Image, color: &ColorData, params: &ProcessingParams) -> u16 {
    let mut mul = if params.user_multipliers[0] > 0.0 {
        params.user_multipliers
    } else if params.use_camera_wb != 0 && color.cam_mul[0] > 0.0 {
        color.cam_mul
    } else {
        color.pre_mul
    };
    if mul[..3].iter().any(|m| *m <= 0.0) {
        log::debug!("unusable multipliers {mul:?}, using unity");
        mul = [1.0; 4];
    }
    if mul[3] <= 0.0 {
        mul[3] = mul[1];
    }

    let dmin = mul.iter().copied().fold(f32::MAX, f32::min);
    let dmax = mul.iter().copied().fold(0.0, f32::max);
    let norm = if params.highlight_mode == 0 { dmin } else { dmax };
    let maximum = color.maximum.max(1) as f32;
    let scale = mul.map(|m| m / norm * 65535.0 / maximum);
    log::debug!("scale_colors: multipliers {mul:?}, scale {scale:?}");

    for px in image.buf_mut().iter_mut() {
        for (v, s) in px.iter_mut().zip(scale) {
            *v = (*v as f32 * s).min(65535.0) as u16;
        }
    }
    let clip = mul[..3].iter().copied().fold(f32::MAX, f32::min) / norm * 65535.0;
    clip.min(65535.0) as u16
}

/// Bilinear interpolation of the two missing colors at each site.
///
/// Each neighbor contributes only its own mosaic color, which is never
/// written here, so the image can be updated in place.
pub(crate) fn bilinear(image: &mut Image, filters: u32) {
    let (width, height) = (image.width(), image.height());
    let img = image.buf_mut();
    for row in 0..height {
        for col in 0..width {
            let own = cfa::fcol(filters, row, col);
            let mut sum = [0u32; 4];
            let mut count = [0u32; 4];
            for y in row.saturating_sub(1)..(row + 2).min(height) {
                for x in col.saturating_sub(1)..(col + 2).min(width) {
                    if (y, x) == (row, col) {
                        continue;
                    }
                    let c = cfa::fcol(filters, y, x);
                    sum[c] += img[y * width + x][c] as u32;
                    count[c] += 1;
                }
            }
            let px = &mut img[row * width + col];
            for c in 0..3 {
                if c != own && count[c] > 0 {
                    px[c] = (sum[c] / count[c]) as u16;
                }
            }
        }
    }
}

/// Median-filter the R−G and B−G differences `passes` times.
pub(crate) fn median_chroma(image: &mut Image, passes: u32) {
    let (width, height) = (image.width(), image.height());
    if width < 3 || height < 3 {
        return;
    }
    let mut diff = vec![0i32; width * height];
    for _ in 0..passes {
        for c in [0, 2] {
            for (d, px) in diff.iter_mut().zip(image.buf().iter()) {
                *d = px[c] as i32 - px[1] as i32;
            }
            let img = image.buf_mut();
            for row in 1..height - 1 {
                for col in 1..width - 1 {
                    let mut window = [0i32; 9];
                    for (i, w) in window.iter_mut().enumerate() {
                        *w = diff[(row + i / 3 - 1) * width + col + i % 3 - 1];
                    }
                    let (_, median, _) = window.select_nth_unstable(4);
                    let px = &mut img[row * width + col];
                    px[c] = (*median + px[1] as i32).clamp(0, 65535) as u16;
                }
            }
        }
    }
}

/// Handle pixels above `clip`. Mode 2 blends them toward neutral; every
/// other mode clips each channel.
pub(crate) fn highlights(image: &mut Image, mode: i32, clip: u16) {
    if clip == u16::MAX {
        return;
    }
    let limit = clip as f32;
    for px in image.buf_mut().iter_mut() {
        let peak = px[..3].iter().copied().max().unwrap_or(0);
        if peak <= clip {
            continue;
        }
        if mode == 2 {
            let mean = px[..3].iter().map(|v| *v as f32).sum::<f32>() / 3.0;
            let t = ((peak - clip) as f32 / (65535.0 - limit).max(1.0)).min(1.0);
            for v in &mut px[..3] {
                *v = (*v as f32 * (1.0 - t) + mean * t).min(limit) as u16;
            }
        } else {
            for v in &mut px[..3] {
                *v = (*v).min(clip);
            }
        }
    }
}

const XYZ_FROM_SRGB: [[f32; 3]; 3] = [
    [0.412453, 0.357580, 0.180423],
    [0.212671, 0.715160, 0.072169],
    [0.019334, 0.119193, 0.950227],
];

/// Convert camera color to the requested output space and histogram the
/// result.
pub(crate) fn convert(
    image: &mut Image,
    output: OutputColor,
    rgb_cam: &[[f32; 4]; 3],
) -> Result<Histogram> {
    let matrix: Option<[[f32; 3]; 3]> = match output {
        OutputColor::Raw => None,
        OutputColor::Srgb => Some(core::array::from_fn(|i| {
            core::array::from_fn(|j| rgb_cam[i][j])
        })),
        OutputColor::Xyz => Some(core::array::from_fn(|i| {
            core::array::from_fn(|j| (0..3).map(|k| XYZ_FROM_SRGB[i][k] * rgb_cam[k][j]).sum())
        })),
        _ => return Err(RawError::NotImplemented("output color space")),
    };

    let mut histogram = Vec::new();
    histogram
        .try_reserve_exact(HISTOGRAM_BINS)
        .map_err(|_| RawError::OutOfMemory("convert_to_rgb()"))?;
    histogram.resize(HISTOGRAM_BINS, [0u32; 4]);

    for px in image.buf_mut().iter_mut() {
        if let Some(m) = &matrix {
            let src = [px[0] as f32, px[1] as f32, px[2] as f32];
            for (v, row) in px.iter_mut().zip(m) {
                let out: f32 = row.iter().zip(src).map(|(a, b)| a * b).sum();
                *v = out.clamp(0.0, 65535.0) as u16;
            }
        }
        for c in 0..3 {
            histogram[(px[c] >> 3) as usize][c] += 1;
        }
    }
    Ok(histogram)
}

/// White point for the output curve, found by clipping at most `fraction`
/// of the pixels in any channel. Returns the histogram bin.
pub(crate) fn auto_white(histogram: &Histogram, pixels: usize, fraction: f32) -> usize {
    let perc = (pixels as f32 * fraction) as u64;
    let mut white = 0;
    for c in 0..3 {
        let mut total = 0u64;
        let mut val = HISTOGRAM_BINS - 1;
        while val > 32 {
            total += histogram[val][c] as u64;
            if total > perc {
                break;
            }
            val -= 1;
        }
        white = white.max(val);
    }
    white
}

/// Forward gamma curve over the full 16-bit range, `imax` mapping to white.
///
/// `power` is the exponent and `toe` the slope of the linear segment near
/// black (BT.709 uses 0.45 and 4.5).
pub(crate) fn gamma_curve(power: f64, toe: f64, imax: i32) -> Vec<u16> {
    let mut g = [power, toe, 0.0, 0.0, 0.0, 0.0];
    let mut bnd = [0.0f64, 0.0];
    bnd[(g[1] >= 1.0) as usize] = 1.0;
    if g[1] != 0.0 && (g[1] - 1.0) * (g[0] - 1.0) <= 0.0 {
        for _ in 0..48 {
            g[2] = (bnd[0] + bnd[1]) / 2.0;
            let side = if g[0] != 0.0 {
                ((g[2] / g[1]).powf(-g[0]) - 1.0) / g[0] - 1.0 / g[2] > -1.0
            } else {
                g[2] / (1.0 - 1.0 / g[2]).exp() < g[1]
            };
            bnd[side as usize] = g[2];
        }
        g[3] = g[2] / g[1];
        if g[0] != 0.0 {
            g[4] = g[2] * (1.0 / g[0] - 1.0);
        }
    }

    let imax = imax.max(1) as f64;
    (0..0x10000u32)
        .map(|i| {
            let r = i as f64 / imax;
            if r >= 1.0 {
                return 0xffff;
            }
            let v = if r < g[3] {
                r * g[1]
            } else if g[0] != 0.0 {
                r.powf(g[0]) * (1.0 + g[4]) - g[4]
            } else {
                r.ln() * g[2] + 1.0
            };
            (0x10000 as f64 * v).clamp(0.0, 65535.0) as u16
        })
        .collect()
}
