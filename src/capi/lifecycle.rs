//! Handle creation, destruction and recycling.

use core::ffi::{c_int, c_uint};
use core::ptr;
use std::alloc::{self, Layout};

use super::{ZenRawHandle, call, guard, with_processor};
use crate::info::{ImageParams, ImgOther, LensInfo};
use crate::params::ProcessingParams;
use crate::processor::Processor;

/// Create an instance. Returns null when allocation fails.
///
/// `flags` is a combination of `OPTIONS_*` bits.
#[unsafe(no_mangle)]
pub extern "C" fn zenraw_init(flags: c_uint) -> *mut ZenRawHandle {
    guard(ptr::null_mut(), || {
        let processor = Processor::new(flags);
        // SAFETY: `Processor` is not zero-sized.
        let raw = unsafe { alloc::alloc(Layout::new::<Processor>()) }.cast::<Processor>();
        if raw.is_null() {
            log::error!("cannot allocate {} bytes for an instance", size_of::<Processor>());
            return ptr::null_mut();
        }
        // SAFETY: freshly allocated with the layout of `Processor`.
        unsafe { raw.write(processor) };
        raw.cast()
    })
}

/// Destroy an instance and everything it owns. Null is ignored.
///
/// # Safety
///
/// `handle` is null or came from [`zenraw_init`] and was not closed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_close(handle: *mut ZenRawHandle) {
    if handle.is_null() {
        return;
    }
    guard((), || {
        // SAFETY: allocated by `zenraw_init` with the global allocator and
        // the layout of `Processor`, which is what `Box` expects.
        drop(unsafe { Box::from_raw(handle.cast::<Processor>()) });
    });
}

/// Reset everything learned from the current input. Parameters and
/// callbacks survive.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_recycle(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            p.recycle();
            Ok(())
        })
    }
}

/// Release the input stream only.
///
/// # Safety
///
/// `handle` is null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_recycle_datastream(handle: *mut ZenRawHandle) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe {
        call(handle, |p| {
            p.recycle_datastream();
            Ok(())
        })
    }
}

/// Identification record, borrowed from the instance.
///
/// # Safety
///
/// `handle` is null or a live handle. The pointer dies with the handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_iparams(handle: *mut ZenRawHandle) -> *const ImageParams {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_processor(handle, ptr::null(), ptr::null(), |p| {
            ptr::from_ref(p.image_params())
        })
    }
}

/// # Safety
///
/// See [`zenraw_get_iparams`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_lensinfo(handle: *mut ZenRawHandle) -> *const LensInfo {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_processor(handle, ptr::null(), ptr::null(), |p| {
            ptr::from_ref(p.lens_info())
        })
    }
}

/// # Safety
///
/// See [`zenraw_get_iparams`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_imgother(handle: *mut ZenRawHandle) -> *const ImgOther {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_processor(handle, ptr::null(), ptr::null(), |p| {
            ptr::from_ref(p.img_other())
        })
    }
}

/// Writable processing parameters.
///
/// # Safety
///
/// See [`zenraw_get_iparams`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn zenraw_get_params(handle: *mut ZenRawHandle) -> *mut ProcessingParams {
    // SAFETY: forwarded from the caller.
    unsafe {
        with_processor(handle, ptr::null_mut(), ptr::null_mut(), |p| {
            ptr::from_mut(p.params_mut())
        })
    }
}
