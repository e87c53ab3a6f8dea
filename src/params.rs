//! Processing parameters.
//!
//! [`ProcessingParams`] is the block foreign callers tune before `process`.
//! It is `repr(C)` because `zenraw_get_params` hands out a borrowed pointer
//! to it; the typed setters in the C API write the same fields.
//!
//! Index-taking setters clamp the index into the array instead of failing:
//! an out-of-range channel writes the nearest valid slot.

use core::ffi::{c_int, c_uint};

/// Number of white-balance channels.
pub const MUL_CHANNELS: usize = 4;
/// Number of gamma curve coefficients.
pub const GAMMA_COEFFS: usize = 6;

/// Tunable processing options.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct ProcessingParams {
    /// User white-balance multipliers; used when `user_multipliers[0] > 0`.
    pub user_multipliers: [f32; MUL_CHANNELS],
    /// Gamma curve: `[power, toe slope, ...]`; the remaining slots are reserved.
    pub gamma: [f64; GAMMA_COEFFS],
    pub brightness: f32,
    /// Fraction of pixels allowed to clip during auto-brightness.
    pub auto_bright_threshold: f32,
    /// Lower `maximum` to the observed data maximum when it exceeds this
    /// fraction of the nominal one. Zero disables.
    pub adjust_maximum_threshold: f32,
    /// Black level override; negative keeps the file's value.
    pub user_black: c_int,
    /// Saturation override; negative keeps the file's value.
    pub user_saturation: c_int,
    pub half_size: c_int,
    pub use_camera_wb: c_int,
    /// Output color space; see [`OutputColor`].
    pub output_color: c_int,
    /// Output bits per sample, 8 or 16.
    pub output_bps: c_int,
    /// Non-zero writes TIFF instead of PPM.
    pub output_tiff: c_int,
    /// Demosaic algorithm selector; see [`Demosaic`].
    pub demosaic: c_int,
    pub no_auto_bright: c_int,
    /// 0 clip, 2 blend; other values clip.
    pub highlight_mode: c_int,
    /// Number of chroma median passes; 0 disables.
    pub noise_reduction: c_int,
    /// Raw buffer budget in MiB; 0 means unlimited.
    pub max_raw_memory_mb: c_uint,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            user_multipliers: [0.0; MUL_CHANNELS],
            gamma: [0.45, 4.5, 0.0, 0.0, 0.0, 0.0],
            brightness: 1.0,
            auto_bright_threshold: 0.01,
            adjust_maximum_threshold: 0.75,
            user_black: -1,
            user_saturation: -1,
            half_size: 0,
            use_camera_wb: 0,
            output_color: OutputColor::Srgb as c_int,
            output_bps: 8,
            output_tiff: 0,
            demosaic: -1,
            no_auto_bright: 0,
            highlight_mode: 0,
            noise_reduction: 0,
            max_raw_memory_mb: 2048,
        }
    }
}

impl ProcessingParams {
    /// Set a white-balance multiplier; `index` is clamped to `0..=3`.
    pub fn set_user_multiplier(&mut self, index: c_int, value: f32) {
        self.user_multipliers[clamp_index(index, MUL_CHANNELS)] = value;
    }

    /// Set a gamma coefficient; `index` is clamped to `0..=5`.
    pub fn set_gamma(&mut self, index: c_int, value: f32) {
        self.gamma[clamp_index(index, GAMMA_COEFFS)] = value as f64;
    }

    pub fn demosaic(&self) -> Demosaic {
        Demosaic::from_code(self.demosaic)
    }

    pub fn output_color(&self) -> Option<OutputColor> {
        OutputColor::from_code(self.output_color)
    }

    /// 16 when requested, otherwise 8.
    pub fn output_bits(&self) -> u16 {
        if self.output_bps == 16 { 16 } else { 8 }
    }
}

/// Clamp a foreign index into `0..len`.
pub(crate) fn clamp_index(index: c_int, len: usize) -> usize {
    index.clamp(0, len as c_int - 1) as usize
}

/// Demosaic algorithm selector.
///
/// Only bilinear interpolation is built in; the other selectors are
/// accepted and fall back to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Demosaic {
    Linear,
    Vng,
    Ppg,
    Ahd,
    Dcb,
    Dht,
    Aahd,
}

impl Demosaic {
    /// Decode a selector; unknown or negative values mean the default (AHD).
    pub fn from_code(code: c_int) -> Self {
        match code {
            0 => Demosaic::Linear,
            1 => Demosaic::Vng,
            2 => Demosaic::Ppg,
            4 => Demosaic::Dcb,
            11 => Demosaic::Dht,
            12 => Demosaic::Aahd,
            _ => Demosaic::Ahd,
        }
    }

    pub fn is_builtin(self) -> bool {
        self == Demosaic::Linear
    }
}

/// Output color space selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum OutputColor {
    /// Camera color, no matrix.
    Raw = 0,
    Srgb = 1,
    Adobe = 2,
    WideGamut = 3,
    ProPhoto = 4,
    Xyz = 5,
    Aces = 6,
    DciP3 = 7,
    Rec2020 = 8,
}

impl OutputColor {
    pub fn from_code(code: c_int) -> Option<Self> {
        Some(match code {
            0 => OutputColor::Raw,
            1 => OutputColor::Srgb,
            2 => OutputColor::Adobe,
            3 => OutputColor::WideGamut,
            4 => OutputColor::ProPhoto,
            5 => OutputColor::Xyz,
            6 => OutputColor::Aces,
            7 => OutputColor::DciP3,
            8 => OutputColor::Rec2020,
            _ => return None,
        })
    }
}
