//! Callback registration. Each setter overwrites its slot; a null function
//! disables the role.

use core::ffi::{c_int, c_void};

use super::{ZenRawHandle, call};
use crate::callbacks::{DataCallback, ExifParserCallback, MemoryCallback, ProgressCallback};

/// # Safety
///
/// `handle` is null or a live handle. `func` must stay callable with
/// `data` while the instance lives.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_set_exifparser_handler(
    handle: *mut ZenRawHandle,
    func: ExifParserCallback,
    data: *mut c_void,
) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            p.callbacks_mut().set_exif_parser(func, data);
            Ok(())
        })
    }
}

/// # Safety
///
/// See [`zenraw_set_exifparser_handler`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_set_memerror_handler(
    handle: *mut ZenRawHandle,
    func: MemoryCallback,
    data: *mut c_void,
) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            p.callbacks_mut().set_memory_error(func, data);
            Ok(())
        })
    }
}

/// # Safety
///
/// See [`zenraw_set_exifparser_handler`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_set_dataerror_handler(
    handle: *mut ZenRawHandle,
    func: DataCallback,
    data: *mut c_void,
) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            p.callbacks_mut().set_data_error(func, data);
            Ok(())
        })
    }
}

/// Progress callback; a non-zero return cancels the running stage.
///
/// # Safety
///
/// See [`zenraw_set_exifparser_handler`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_set_progress_handler(
    handle: *mut ZenRawHandle,
    func: ProgressCallback,
    data: *mut c_void,
) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            p.callbacks_mut().set_progress(func, data);
            Ok(())
        })
    }
}
