//! Parameter setters and decode-state getters.
//!
//! Index arguments are clamped into range. Getters report whatever the
//! instance holds, defaults included; no stage ordering is enforced.

use core::ffi::{c_int, c_uint};

use super::{ZenRawHandle, call, with_processor};
use crate::error::{EINVAL, UNSPECIFIED_ERROR};
use crate::info::ColorData;
use crate::params::{MUL_CHANNELS, ProcessingParams, clamp_index};
use crate::processor::Processor;

/// # Safety
///
/// `handle` is null or a live handle.
unsafe fn set(handle: *mut ZenRawHandle, f: impl FnOnce(&mut ProcessingParams)) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            f(p.params_mut());
            Ok(())
        })
    }
}

/// # Safety
///
/// `handle` is null or a live handle.
unsafe fn get_int(handle: *mut ZenRawHandle, f: impl FnOnce(&Processor) -> c_int) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { with_processor(handle, EINVAL, UNSPECIFIED_ERROR, |p| f(p)) }
}

/// # Safety
///
/// `handle` is null or a live handle.
unsafe fn get_float(handle: *mut ZenRawHandle, f: impl FnOnce(&ColorData) -> f32) -> f32 {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_processor(handle, EINVAL as f32, UNSPECIFIED_ERROR as f32, |p| {
            f(p.color())
        })
    }
}

macro_rules! setter {
    ($(#[$doc:meta])* $name:ident => $field:ident: $ty:ty) => {
        $(#[$doc])*
        ///
        /// # Safety
        ///
        /// `handle` is null or a live handle.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(handle: *mut ZenRawHandle, value: $ty) -> c_int {
            // SAFETY: forwarded from the caller.
            unsafe { set(handle, |params| params.$field = value) }
        }
    };
}

setter!(
    /// Demosaic selector; unknown codes fall back to bilinear.
    zenraw_set_demosaic => demosaic: c_int
);
setter!(
    /// Output color space code.
    zenraw_set_output_color => output_color: c_int
);
setter!(
    /// Threshold above which the observed maximum replaces the nominal one.
    zenraw_set_adjust_maximum_thr => adjust_maximum_threshold: f32
);
setter!(
    /// 8 or 16.
    zenraw_set_output_bps => output_bps: c_int
);
setter!(
    /// Non-zero writes TIFF instead of PPM.
    zenraw_set_output_tif => output_tiff: c_int
);
setter!(
    zenraw_set_no_auto_bright => no_auto_bright: c_int
);
setter!(
    zenraw_set_bright => brightness: f32
);
setter!(
    zenraw_set_auto_bright_thr => auto_bright_threshold: f32
);
setter!(
    /// 0 clips, 2 blends clipped highlights toward neutral.
    zenraw_set_highlight => highlight_mode: c_int
);
setter!(
    /// Passes of the chroma median filter.
    zenraw_set_noise_reduction => noise_reduction: c_int
);
setter!(
    zenraw_set_half_size => half_size: c_int
);
setter!(
    zenraw_set_use_camera_wb => use_camera_wb: c_int
);
setter!(
    /// Black level override; negative uses the file's value.
    zenraw_set_user_black => user_black: c_int
);
setter!(
    /// Saturation override; non-positive uses the file's value.
    zenraw_set_user_sat => user_saturation: c_int
);
setter!(
    /// Raw buffer budget in MiB; zero is unlimited.
    zenraw_set_max_raw_memory_mb => max_raw_memory_mb: c_uint
);

/// White-balance multiplier for channel `index`, clamped to `0..=3`.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_set_user_mul(
    handle: *mut ZenRawHandle,
    index: c_int,
    value: f32,
) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { set(handle, |params| params.set_user_multiplier(index, value)) }
}

/// Gamma coefficient `index`, clamped to `0..=5`. Slot 0 is the power,
/// slot 1 the toe slope.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_set_gamma(handle: *mut ZenRawHandle, index: c_int, value: f32) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { set(handle, |params| params.set_gamma(index, value)) }
}

/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_raw_height(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { get_int(handle, |p| p.sizes().raw_height as c_int) }
}

/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_raw_width(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { get_int(handle, |p| p.sizes().raw_width as c_int) }
}

/// Output height after size adjustment.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_iheight(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { get_int(handle, |p| p.sizes().iheight as c_int) }
}

/// Output width after size adjustment.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_iwidth(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { get_int(handle, |p| p.sizes().iwidth as c_int) }
}

/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_color_maxval(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { get_int(handle, |p| p.color().maximum as c_int) }
}

/// As-shot multiplier for channel `index`, clamped to `0..=3`.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_cam_mul(handle: *mut ZenRawHandle, index: c_int) -> f32 {
    // SAFETY: forwarded from the caller.
    unsafe { get_float(handle, |c| c.cam_mul[clamp_index(index, MUL_CHANNELS)]) }
}

/// Daylight multiplier for channel `index`, clamped to `0..=3`.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_pre_mul(handle: *mut ZenRawHandle, index: c_int) -> f32 {
    // SAFETY: forwarded from the caller.
    unsafe { get_float(handle, |c| c.pre_mul[clamp_index(index, MUL_CHANNELS)]) }
}

/// Camera-to-RGB matrix entry, `row` clamped to `0..=2` and `col` to
/// `0..=3`.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_rgb_cam(handle: *mut ZenRawHandle, row: c_int, col: c_int) -> f32 {
    // SAFETY: forwarded from the caller.
    unsafe {
        get_float(handle, |c| {
            let row = &c.rgb_cam[clamp_index(row, c.rgb_cam.len())];
            row[clamp_index(col, row.len())]
        })
    }
}
