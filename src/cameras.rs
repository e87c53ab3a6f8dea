//! Compiled-in list of supported inputs.

use core::ffi::{CStr, c_char};
use core::ptr;

const NAMES: [&CStr; 5] = [
    c"Generic Netpbm Bayer mosaic (8-bit)",
    c"Generic Netpbm Bayer mosaic (16-bit)",
    c"Generic Bayer dump (8-bit)",
    c"Generic Bayer dump (16-bit, big-endian)",
    c"Generic Bayer dump (16-bit, little-endian)",
];

/// Supported input names.
pub fn names() -> &'static [&'static CStr] {
    &NAMES
}

/// Null-terminated array of C string pointers, as `zenraw_camera_list`
/// hands it out.
pub(crate) struct CameraTable([*const c_char; NAMES.len() + 1]);

// SAFETY: the pointers refer to immutable static strings.
unsafe impl Sync for CameraTable {}

impl CameraTable {
    pub(crate) fn as_ptr(&self) -> *const *const c_char {
        self.0.as_ptr()
    }
}

const fn table() -> [*const c_char; NAMES.len() + 1] {
    let mut out = [ptr::null(); NAMES.len() + 1];
    let mut i = 0;
    while i < NAMES.len() {
        out[i] = NAMES[i].as_ptr();
        i += 1;
    }
    out
}

pub(crate) static CAMERA_TABLE: CameraTable = CameraTable(table());
