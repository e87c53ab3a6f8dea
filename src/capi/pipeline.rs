//! Decoding, development and output entry points.

use core::ffi::{c_char, c_int};
use core::ptr;

use super::{ZenRawHandle, call, guard, set_errc, with_processor};
use crate::error::{EINVAL, Result, SUCCESS, UNSPECIFIED_ERROR};
use crate::info::DecoderInfo;
use crate::output::ProcessedImage;
use crate::processor::Processor;

/// # Safety
///
/// `path` is null or a NUL-terminated string.
unsafe fn output_path(path: *const c_char) -> Option<std::path::PathBuf> {
    if path.is_null() {
        return None;
    }
    // SAFETY: see the function contract.
    let path = unsafe { core::ffi::CStr::from_ptr(path) };
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Some(std::ffi::OsStr::from_bytes(path.to_bytes()).into())
    }
    #[cfg(not(unix))]
    {
        Some(path.to_string_lossy().into_owned().into())
    }
}

/// Read the raw mosaic.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_unpack(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, Processor::unpack) }
}

/// Read the embedded thumbnail.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_unpack_thumb(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, Processor::unpack_thumb) }
}

/// Fill output sizes without decoding.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_adjust_sizes_info_only(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, Processor::adjust_sizes_info_only) }
}

/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_raw2image(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, Processor::raw2image) }
}

/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_free_image(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            p.free_image();
            Ok(())
        })
    }
}

/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_subtract_black(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, Processor::subtract_black) }
}

/// Run the development pipeline on the unpacked mosaic.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_process(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, Processor::process) }
}

/// # Safety
///
/// `handle` is null or a live handle; `info` is null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_decoder_info(
    handle: *mut ZenRawHandle,
    info: *mut DecoderInfo,
) -> c_int {
    if info.is_null() {
        return EINVAL;
    }
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            let decoder = p.decoder_info()?;
            // SAFETY: checked non-null, valid per the contract.
            info.write(decoder);
            Ok(())
        })
    }
}

/// Mosaic color index at a visible site, 6 before identification.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_color(handle: *mut ZenRawHandle, row: c_int, col: c_int) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { with_processor(handle, EINVAL, UNSPECIFIED_ERROR, |p| p.color_at(row, col)) }
}

/// Name of the active decoder.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_unpack_function_name(handle: *mut ZenRawHandle) -> *const c_char {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_processor(
            handle,
            c"NULL parameter passed".as_ptr(),
            c"Function not set".as_ptr(),
            |p| p.unpack_function_name().as_ptr(),
        )
    }
}

/// Write the processed image as PPM or TIFF.
///
/// # Safety
///
/// `handle` is null or a live handle; `path` is null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_write_image(handle: *mut ZenRawHandle, path: *const c_char) -> c_int {
    // SAFETY: forwarded from the caller.
    let Some(path) = (unsafe { output_path(path) }) else {
        return EINVAL;
    };
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, |p| p.write_image(&path)) }
}

/// Write the unpacked thumbnail as PPM or PGM.
///
/// # Safety
///
/// See [`zenraw_write_image`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_write_thumb(handle: *mut ZenRawHandle, path: *const c_char) -> c_int {
    // SAFETY: forwarded from the caller.
    let Some(path) = (unsafe { output_path(path) }) else {
        return EINVAL;
    };
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, |p| p.write_thumb(&path)) }
}

/// # Safety
///
/// `handle` is null or a live handle; `errc` is null or valid for writes.
unsafe fn make_image(
    handle: *mut ZenRawHandle,
    errc: *mut c_int,
    make: fn(&Processor) -> Result<*mut ProcessedImage>,
) -> *mut ProcessedImage {
    // SAFETY: forwarded from the caller.
    let made = unsafe {
        with_processor(handle, Err(EINVAL), Err(UNSPECIFIED_ERROR), |p| {
            make(p).map_err(|err| {
                log::debug!("cannot render image: {err}");
                err.code()
            })
        })
    };
    let (image, code) = match made {
        Ok(image) => (image, SUCCESS),
        Err(code) => (ptr::null_mut(), code),
    };
    // SAFETY: forwarded from the caller.
    unsafe { set_errc(errc, code) };
    image
}

/// Render the processed image into a new buffer. Release it with
/// [`zenraw_clear_mem`].
///
/// # Safety
///
/// `handle` is null or a live handle; `errc` is null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_make_mem_image(
    handle: *mut ZenRawHandle,
    errc: *mut c_int,
) -> *mut ProcessedImage {
    // SAFETY: forwarded from the caller.
    unsafe { make_image(handle, errc, Processor::make_mem_image) }
}

/// Copy the unpacked thumbnail into a new buffer. Release it with
/// [`zenraw_clear_mem`].
///
/// # Safety
///
/// See [`zenraw_make_mem_image`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_make_mem_thumb(
    handle: *mut ZenRawHandle,
    errc: *mut c_int,
) -> *mut ProcessedImage {
    // SAFETY: forwarded from the caller.
    unsafe { make_image(handle, errc, Processor::make_mem_thumb) }
}

/// Release an image from the `make_mem` functions. Null is ignored.
///
/// # Safety
///
/// `image` is null or came from a `make_mem` function and was not released.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_clear_mem(image: *mut ProcessedImage) {
    // SAFETY: see the function contract.
    guard((), || unsafe { ProcessedImage::free(image) });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_contract() {
        let mut errc = 0;
        unsafe {
            assert_eq!(zenraw_unpack(ptr::null_mut()), EINVAL);
            assert_eq!(zenraw_process(ptr::null_mut()), EINVAL);
            assert_eq!(zenraw_color(ptr::null_mut(), 0, 0), EINVAL);
            assert!(zenraw_make_mem_image(ptr::null_mut(), &mut errc).is_null());
            assert_eq!(errc, EINVAL);
            assert!(zenraw_make_mem_thumb(ptr::null_mut(), ptr::null_mut()).is_null());
            zenraw_clear_mem(ptr::null_mut());
            let name = core::ffi::CStr::from_ptr(zenraw_unpack_function_name(ptr::null_mut()));
            assert_eq!(name, c"NULL parameter passed");
        }
    }
}
