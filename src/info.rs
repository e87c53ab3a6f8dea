//! Metadata records shared with foreign callers.
//!
//! Every record here is `repr(C)` because the C API hands out borrowed
//! pointers to them (`zenraw_get_iparams`, `zenraw_get_lensinfo`,
//! `zenraw_get_imgother`). Text fields are fixed-size NUL-terminated arrays.

use core::ffi::{c_char, c_int, c_uint};

/// Camera and format identification.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct ImageParams {
    pub make: [c_char; 64],
    pub model: [c_char; 64],
    pub software: [c_char; 64],
    /// Number of raw images in the container.
    pub raw_count: c_uint,
    /// Number of color channels in the mosaic (3 for RGB Bayer).
    pub colors: c_int,
    /// Bayer pattern, 2 bits per position, 8 positions repeated over 32 bits.
    pub filters: c_uint,
    /// Channel letters indexed by color, NUL terminated.
    pub cdesc: [c_char; 5],
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            make: [0; 64],
            model: [0; 64],
            software: [0; 64],
            raw_count: 0,
            colors: 0,
            filters: 0,
            cdesc: [0; 5],
        }
    }
}

/// Lens description.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct LensInfo {
    pub min_focal: f32,
    pub max_focal: f32,
    pub max_ap4_min_focal: f32,
    pub max_ap4_max_focal: f32,
    pub exif_max_ap: f32,
    pub lens_make: [c_char; 128],
    pub lens: [c_char; 128],
    pub focal_length_35mm: u16,
}

impl Default for LensInfo {
    fn default() -> Self {
        Self {
            min_focal: 0.0,
            max_focal: 0.0,
            max_ap4_min_focal: 0.0,
            max_ap4_max_focal: 0.0,
            exif_max_ap: 0.0,
            lens_make: [0; 128],
            lens: [0; 128],
            focal_length_35mm: 0,
        }
    }
}

/// Exposure, capture time, GPS and free-text metadata.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct ImgOther {
    pub iso_speed: f32,
    /// Exposure time in seconds.
    pub shutter: f32,
    /// F-number.
    pub aperture: f32,
    /// Focal length in millimetres.
    pub focal_len: f32,
    /// Capture time, seconds since the Unix epoch.
    pub timestamp: i64,
    pub shot_order: c_uint,
    pub gpsdata: [c_uint; 32],
    pub desc: [c_char; 512],
    pub artist: [c_char; 64],
}

impl Default for ImgOther {
    fn default() -> Self {
        Self {
            iso_speed: 0.0,
            shutter: 0.0,
            aperture: 0.0,
            focal_len: 0.0,
            timestamp: 0,
            shot_order: 0,
            gpsdata: [0; 32],
            desc: [0; 512],
            artist: [0; 64],
        }
    }
}

/// Decode-derived geometry.
///
/// `raw_*` describe the stored mosaic including margins; `width`/`height`
/// the visible area; `iwidth`/`iheight` the working image (halved when
/// half-size processing is on).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct ImageSizes {
    pub raw_height: u16,
    pub raw_width: u16,
    pub height: u16,
    pub width: u16,
    pub top_margin: u16,
    pub left_margin: u16,
    pub iheight: u16,
    pub iwidth: u16,
    /// Bytes per raw row.
    pub raw_pitch: c_uint,
    pub pixel_aspect: f64,
    pub flip: c_int,
}

/// Color-correction state.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct ColorData {
    pub black: c_uint,
    pub maximum: c_uint,
    /// Largest sample actually present after unpack.
    pub data_maximum: c_uint,
    /// As-shot white balance from the camera.
    pub cam_mul: [f32; 4],
    /// Daylight multipliers.
    pub pre_mul: [f32; 4],
    /// Camera space to sRGB.
    pub rgb_cam: [[f32; 4]; 3],
}

impl Default for ColorData {
    fn default() -> Self {
        Self {
            black: 0,
            maximum: 0,
            data_maximum: 0,
            cam_mul: [0.0; 4],
            pre_mul: [0.0; 4],
            rgb_cam: IDENTITY_RGB_CAM,
        }
    }
}

pub(crate) const IDENTITY_RGB_CAM: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// Mosaic holds one sample per pixel.
pub const DECODER_FLATDATA: c_uint = 1;
/// Samples are stored as single bytes.
pub const DECODER_8BIT: c_uint = 1 << 1;

/// Active decoder description filled by `zenraw_get_decoder_info`.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct DecoderInfo {
    /// Static NUL-terminated name, never freed by the caller.
    pub decoder_name: *const c_char,
    pub decoder_flags: c_uint,
}

/// Copy `src` into a fixed C string field, truncating to leave room for NUL.
pub(crate) fn set_cstr(dst: &mut [c_char], src: &str) {
    dst.fill(0);
    let len = src.len().min(dst.len().saturating_sub(1));
    for (d, s) in dst.iter_mut().zip(&src.as_bytes()[..len]) {
        *d = *s as c_char;
    }
}

/// Read a fixed C string field back as bytes (up to the first NUL).
pub fn cstr_bytes(src: &[c_char]) -> Vec<u8> {
    src.iter()
        .take_while(|c| **c != 0)
        .map(|c| *c as u8)
        .collect()
}
