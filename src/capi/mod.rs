//! Flat C entry points.
//!
//! Every function here follows the same contract:
//!
//! - a null handle or null required pointer returns [`EINVAL`] (22), `22.0`
//!   from float getters, or null, without touching memory;
//! - engine failures return their negative code from [`crate::error`];
//! - pointer results write their status into an optional `errc`;
//! - panics are caught and reported as `UNSPECIFIED_ERROR` or null.
//!
//! The caller must drive one handle from one thread at a time.

mod callbacks;
mod introspect;
mod lifecycle;
mod open;
mod params;
mod pipeline;

pub use callbacks::*;
pub use introspect::*;
pub use lifecycle::*;
pub use open::*;
pub use params::*;
pub use pipeline::*;

use core::ffi::c_int;
use core::marker::{PhantomData, PhantomPinned};
use std::panic::{self, AssertUnwindSafe};

use crate::error::{self, EINVAL, Result, UNSPECIFIED_ERROR};
use crate::processor::Processor;

/// Opaque per-session handle. Only ever used behind a pointer.
#[repr(C)]
pub struct ZenRawHandle {
    _private: [u8; 0],
    _marker: PhantomData<(*mut u8, PhantomPinned)>,
}

/// # Safety
///
/// `handle` is null or came from `zenraw_init` and is still open.
unsafe fn processor<'a>(handle: *mut ZenRawHandle) -> Option<&'a mut Processor> {
    // SAFETY: see the function contract.
    unsafe { handle.cast::<Processor>().as_mut() }
}

/// Run `f`, turning a panic into `panicked`.
fn guard<T>(panicked: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("panic caught at the C boundary");
        panicked
    })
}

/// # Safety
///
/// Same as [`processor`].
unsafe fn with_processor<T>(
    handle: *mut ZenRawHandle,
    invalid: T,
    panicked: T,
    f: impl FnOnce(&mut Processor) -> T,
) -> T {
    guard(panicked, || {
        // SAFETY: forwarded from the caller.
        match unsafe { processor(handle) } {
            Some(p) => f(p),
            None => invalid,
        }
    })
}

/// Run a fallible operation and return its status code.
///
/// # Safety
///
/// Same as [`processor`].
unsafe fn call(handle: *mut ZenRawHandle, f: impl FnOnce(&mut Processor) -> Result<()>) -> c_int {
    // SAFETY: forwarded from the caller.
    unsafe { with_processor(handle, EINVAL, UNSPECIFIED_ERROR, |p| error::status(f(p))) }
}

/// Store `code` through an optional out-parameter.
///
/// # Safety
///
/// `errc` is null or valid for writes.
unsafe fn set_errc(errc: *mut c_int, code: c_int) {
    // SAFETY: see the function contract.
    if let Some(out) = unsafe { errc.as_mut() } {
        *out = code;
    }
}
