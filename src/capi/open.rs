//! Attaching inputs to an instance.

use core::ffi::{CStr, c_char, c_int, c_uint, c_void};
use core::ptr;
use std::path::PathBuf;

use super::{ZenRawHandle, call, with_processor};
use crate::adapter::{self, ForeignStream, ZenRawDataStream};
use crate::error::{EINVAL, SUCCESS};
use crate::processor::BayerDump;
use crate::stream::StreamSlot;

/// # Safety
///
/// `path` is null or a NUL-terminated string.
unsafe fn narrow_path(path: *const c_char) -> Option<PathBuf> {
    if path.is_null() {
        return None;
    }
    // SAFETY: see the function contract.
    let bytes = unsafe { CStr::from_ptr(path) }.to_bytes();
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Some(PathBuf::from(std::ffi::OsStr::from_bytes(bytes)))
    }
    #[cfg(not(unix))]
    {
        Some(PathBuf::from(String::from_utf8_lossy(bytes).into_owned()))
    }
}

/// Open a file by path.
///
/// # Safety
///
/// `handle` is null or a live handle; `path` is null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_open_file(handle: *mut ZenRawHandle, path: *const c_char) -> c_int {
    // SAFETY: forwarded from the caller.
    let Some(path) = (unsafe { narrow_path(path) }) else {
        return EINVAL;
    };
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, |p| p.open_file(&path)) }
}

/// Open a file, reading it into memory when it is at most `max_buf_size`
/// bytes. Negative sizes count as zero.
///
/// # Safety
///
/// See [`zenraw_open_file`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_open_file_ex(
    handle: *mut ZenRawHandle,
    path: *const c_char,
    max_buf_size: i64,
) -> c_int {
    // SAFETY: forwarded from the caller.
    let Some(path) = (unsafe { narrow_path(path) }) else {
        return EINVAL;
    };
    let hint = u64::try_from(max_buf_size).unwrap_or(0);
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, |p| p.open_file_ex(&path, hint)) }
}

#[cfg(windows)]
mod wide {
    use super::*;
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    /// # Safety
    ///
    /// `path` is null or a NUL-terminated UTF-16 string.
    unsafe fn wide_path(path: *const u16) -> Option<PathBuf> {
        if path.is_null() {
            return None;
        }
        let mut len = 0;
        // SAFETY: see the function contract.
        while unsafe { *path.add(len) } != 0 {
            len += 1;
        }
        // SAFETY: `len` units were just read.
        let units = unsafe { core::slice::from_raw_parts(path, len) };
        Some(PathBuf::from(OsString::from_wide(units)))
    }

    /// UTF-16 variant of [`zenraw_open_file`].
    ///
    /// # Safety
    ///
    /// `handle` is null or a live handle; `path` is null or NUL-terminated.
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn zenraw_open_wfile(handle: *mut ZenRawHandle, path: *const u16) -> c_int {
        // SAFETY: forwarded from the caller.
        let Some(path) = (unsafe { wide_path(path) }) else {
            return EINVAL;
        };
        // SAFETY: forwarded from the caller.
        unsafe { call(handle, |p| p.open_file(&path)) }
    }

    /// UTF-16 variant of [`zenraw_open_file_ex`].
    ///
    /// # Safety
    ///
    /// See [`zenraw_open_wfile`].
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn zenraw_open_wfile_ex(
        handle: *mut ZenRawHandle,
        path: *const u16,
        max_buf_size: i64,
    ) -> c_int {
        // SAFETY: forwarded from the caller.
        let Some(path) = (unsafe { wide_path(path) }) else {
            return EINVAL;
        };
        let hint = u64::try_from(max_buf_size).unwrap_or(0);
        // SAFETY: forwarded from the caller.
        unsafe { call(handle, |p| p.open_file_ex(&path, hint)) }
    }
}

#[cfg(windows)]
pub use wide::{zenraw_open_wfile, zenraw_open_wfile_ex};

/// Open a copy of `size` bytes at `buffer`.
///
/// # Safety
///
/// `handle` is null or a live handle; `buffer` is null or valid for `size`
/// bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_open_buffer(
    handle: *mut ZenRawHandle,
    buffer: *const c_void,
    size: usize,
) -> c_int {
    if buffer.is_null() {
        return EINVAL;
    }
    // SAFETY: see the function contract.
    let data = unsafe { core::slice::from_raw_parts(buffer.cast::<u8>(), size) };
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, |p| p.open_buffer(data)) }
}

/// Open a headerless Bayer mosaic of `datalen` bytes.
///
/// `procflags` bit 0 marks big-endian 16-bit samples; `otherflags` bit 0
/// marks 8-bit samples. `bayer_pattern` is one of the `PATTERN_*` bytes.
///
/// # Safety
///
/// `handle` is null or a live handle; `data` is null or valid for `datalen`
/// bytes.
#[allow(clippy::too_many_arguments)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_open_bayer(
    handle: *mut ZenRawHandle,
    data: *const u8,
    datalen: c_uint,
    raw_width: u16,
    raw_height: u16,
    left_margin: u16,
    top_margin: u16,
    right_margin: u16,
    bottom_margin: u16,
    procflags: u8,
    bayer_pattern: u8,
    unused_bits: c_uint,
    otherflags: c_uint,
    black_level: c_uint,
) -> c_int {
    if data.is_null() {
        return EINVAL;
    }
    // SAFETY: see the function contract.
    let bytes = unsafe { core::slice::from_raw_parts(data, datalen as usize) };
    let dump = BayerDump {
        raw_width,
        raw_height,
        left_margin,
        top_margin,
        right_margin,
        bottom_margin,
        procflags,
        bayer_pattern,
        unused_bits,
        otherflags,
        black_level,
    };
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, |p| p.open_bayer(bytes, &dump)) }
}

/// Open a caller-implemented stream. The table is copied; the functions
/// and `user_data` must stay valid until the instance is recycled or
/// closed.
///
/// # Safety
///
/// `handle` is null or a live handle; `stream` is null or points to a
/// descriptor whose functions honor the stream contract.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_open_datastream(
    handle: *mut ZenRawHandle,
    stream: *const ZenRawDataStream,
) -> c_int {
    // SAFETY: see the function contract.
    let Some(table) = (unsafe { stream.as_ref() }) else {
        return EINVAL;
    };
    // SAFETY: see the function contract.
    let foreign: StreamSlot = Box::new(unsafe { ForeignStream::new(table) });
    // SAFETY: forwarded from the caller.
    unsafe { call(handle, |p| p.open_datastream(foreign)) }
}

/// Fill `dst` with functions that drive the engine stream `ifp`, as passed
/// to the EXIF-parser callback or returned by [`zenraw_input_stream`].
///
/// # Safety
///
/// `ifp` is null or an engine stream pointer that outlives every use of
/// `dst`; `dst` is null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_wrap_stream(ifp: *mut c_void, dst: *mut ZenRawDataStream) -> c_int {
    if ifp.is_null() {
        return EINVAL;
    }
    // SAFETY: see the function contract.
    let Some(dst) = (unsafe { dst.as_mut() }) else {
        return EINVAL;
    };
    // SAFETY: see the function contract.
    unsafe { adapter::wrap_stream(ifp.cast::<StreamSlot>(), dst) };
    SUCCESS
}

/// The instance's open stream, or null when none is attached.
///
/// # Safety
///
/// `handle` is null or a live handle. The pointer dies on recycle, reopen
/// or close.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_input_stream(handle: *mut ZenRawHandle) -> *mut c_void {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_processor(handle, ptr::null_mut(), ptr::null_mut(), |p| {
            p.stream_slot()
                .map_or(ptr::null_mut(), |slot| ptr::from_mut(slot).cast())
        })
    }
}
