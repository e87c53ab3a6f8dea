//! Handle-free queries over compiled-in constants.

use core::ffi::{CStr, c_char, c_int, c_uint};

use super::guard;
use crate::cameras::{self, CAMERA_TABLE};
use crate::capabilities::EngineCapabilities;
use crate::error;
use crate::progress;

const VERSION: &CStr =
    match CStr::from_bytes_with_nul(concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes()) {
        Ok(version) => version,
        Err(_) => c"0.0.0",
    };

const fn parse_component(s: &str) -> c_int {
    let bytes = s.as_bytes();
    let mut value = 0;
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value * 10 + (bytes[i] - b'0') as c_int;
        i += 1;
    }
    value
}

/// `(major << 16) | (minor << 8) | patch`.
pub const VERSION_NUMBER: c_int = (parse_component(env!("CARGO_PKG_VERSION_MAJOR")) << 16)
    | (parse_component(env!("CARGO_PKG_VERSION_MINOR")) << 8)
    | parse_component(env!("CARGO_PKG_VERSION_PATCH"));

/// `CAPS_*` bits of this build.
#[unsafe(no_mangle)]
pub extern "C" fn zenraw_capabilities() -> c_uint {
    EngineCapabilities::current().bits()
}

/// Version string, e.g. `"0.1.0"`.
#[unsafe(no_mangle)]
pub extern "C" fn zenraw_version() -> *const c_char {
    VERSION.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn zenraw_version_number() -> c_int {
    VERSION_NUMBER
}

/// Null-terminated list of supported input names. Static; never free it.
#[unsafe(no_mangle)]
pub extern "C" fn zenraw_camera_list() -> *const *const c_char {
    CAMERA_TABLE.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn zenraw_camera_count() -> c_int {
    cameras::names().len() as c_int
}

/// Name of a progress stage value.
#[unsafe(no_mangle)]
pub extern "C" fn zenraw_strprogress(stage: c_int) -> *const c_char {
    guard(c"Some progress stage".as_ptr(), || {
        progress::strprogress(stage).as_ptr()
    })
}

/// Message for an error code.
#[unsafe(no_mangle)]
pub extern "C" fn zenraw_strerror(code: c_int) -> *const c_char {
    guard(c"Unknown error code".as_ptr(), || error::strerror(code).as_ptr())
}
