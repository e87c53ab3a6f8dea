//! Per-instance callback slots.
//!
//! Four roles, each a `(function pointer, user data)` pair. The boundary
//! layer only stores registrations; the engine fires them. A `None`
//! function pointer means "do not call". Overwriting a slot discards the
//! previous pair without invoking it.

use core::ffi::{CStr, c_char, c_int, c_uint, c_void};
use core::ptr;

use enough::StopReason;

use crate::progress::Progress;

/// Invoked for every metadata tag the parser meets. `ifp` is the engine's
/// stream slot, positioned at the tag value; `zenraw_wrap_stream` turns it
/// into a readable stream descriptor.
pub type ExifParserCallback = Option<
    unsafe extern "C" fn(
        context: *mut c_void,
        tag: c_int,
        tag_type: c_int,
        len: c_int,
        ord: c_uint,
        ifp: *mut c_void,
        base: i64,
    ),
>;

/// Invoked when an allocation inside the engine fails.
pub type MemoryCallback =
    Option<unsafe extern "C" fn(data: *mut c_void, file: *const c_char, location: *const c_char)>;

/// Invoked when input data is corrupt or truncated at `offset`.
pub type DataCallback =
    Option<unsafe extern "C" fn(data: *mut c_void, file: *const c_char, offset: c_int)>;

/// Invoked at the start and end of each stage. A non-zero return cancels.
pub type ProgressCallback = Option<
    unsafe extern "C" fn(data: *mut c_void, stage: c_int, iteration: c_int, expected: c_int) -> c_int,
>;

/// Skip installing the logging memory-error handler at init.
pub const OPTIONS_NO_MEMERR_CALLBACK: c_uint = 1;
/// Skip installing the logging data-error handler at init.
pub const OPTIONS_NO_DATAERR_CALLBACK: c_uint = 2;

/// EXIF field type for ASCII values.
pub const EXIF_TYPE_ASCII: c_int = 2;
/// Big-endian ("MM") byte order marker.
pub const EXIF_ORDER_MM: c_uint = 0x4d4d;

/// One registered callback.
#[derive(Clone, Copy)]
pub struct Slot<F> {
    pub func: F,
    pub data: *mut c_void,
}

impl<F> Slot<F> {
    fn new(func: F) -> Self {
        Self {
            func,
            data: ptr::null_mut(),
        }
    }
}

/// The four callback roles of one instance.
pub struct CallbackRegistry {
    exif_parser: Slot<ExifParserCallback>,
    memory_error: Slot<MemoryCallback>,
    data_error: Slot<DataCallback>,
    progress: Slot<ProgressCallback>,
}

impl CallbackRegistry {
    /// Registry for a fresh instance. Logging handlers fill the error slots
    /// unless `flags` opts out of them.
    pub fn new(flags: c_uint) -> Self {
        let memory: MemoryCallback = if flags & OPTIONS_NO_MEMERR_CALLBACK == 0 {
            Some(log_memory_error)
        } else {
            None
        };
        let data: DataCallback = if flags & OPTIONS_NO_DATAERR_CALLBACK == 0 {
            Some(log_data_error)
        } else {
            None
        };
        Self {
            exif_parser: Slot::new(None),
            memory_error: Slot::new(memory),
            data_error: Slot::new(data),
            progress: Slot::new(None),
        }
    }

    pub fn set_exif_parser(&mut self, func: ExifParserCallback, data: *mut c_void) {
        self.exif_parser = Slot { func, data };
    }

    pub fn set_memory_error(&mut self, func: MemoryCallback, data: *mut c_void) {
        self.memory_error = Slot { func, data };
    }

    pub fn set_data_error(&mut self, func: DataCallback, data: *mut c_void) {
        self.data_error = Slot { func, data };
    }

    pub fn set_progress(&mut self, func: ProgressCallback, data: *mut c_void) {
        self.progress = Slot { func, data };
    }

    pub(crate) fn has_exif_parser(&self) -> bool {
        self.exif_parser.func.is_some()
    }

    /// Offer one ASCII tag of `len` bytes to the EXIF-parser hook.
    pub(crate) fn exif_tag(&self, tag: c_int, len: usize, ifp: *mut c_void) {
        let Slot { func, data } = self.exif_parser;
        if let Some(func) = func {
            let len = c_int::try_from(len).unwrap_or(c_int::MAX);
            // SAFETY: registered by the foreign caller, who guarantees the
            // pointer stays callable while the instance lives.
            unsafe { func(data, tag, EXIF_TYPE_ASCII, len, EXIF_ORDER_MM, ifp, 0) };
        }
    }

    pub(crate) fn memory_error(&self, file: &CStr, location: &CStr) {
        let Slot { func, data } = self.memory_error;
        if let Some(func) = func {
            // SAFETY: see `exif_tag`.
            unsafe { func(data, file.as_ptr(), location.as_ptr()) };
        }
    }

    pub(crate) fn data_error(&self, file: &CStr, offset: i64) {
        let Slot { func, data } = self.data_error;
        if let Some(func) = func {
            let offset = c_int::try_from(offset).unwrap_or(c_int::MAX);
            // SAFETY: see `exif_tag`.
            unsafe { func(data, file.as_ptr(), offset) };
        }
    }

    /// Report a stage checkpoint; a non-zero answer asks the engine to stop.
    pub(crate) fn progress(
        &self,
        stage: Progress,
        iteration: c_int,
        expected: c_int,
    ) -> Result<(), StopReason> {
        let Slot { func, data } = self.progress;
        let Some(func) = func else {
            return Ok(());
        };
        // SAFETY: see `exif_tag`.
        let verdict = unsafe { func(data, stage as c_int, iteration, expected) };
        if verdict != 0 {
            log::debug!("progress callback cancelled at {:?}", stage);
            return Err(StopReason::Cancelled);
        }
        Ok(())
    }
}

impl core::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("exif_parser", &self.exif_parser.func.is_some())
            .field("memory_error", &self.memory_error.func.is_some())
            .field("data_error", &self.data_error.func.is_some())
            .field("progress", &self.progress.func.is_some())
            .finish()
    }
}

fn lossy(text: *const c_char) -> String {
    if text.is_null() {
        return String::from("(unknown)");
    }
    // SAFETY: the engine only passes NUL-terminated strings it owns.
    unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
}

unsafe extern "C" fn log_memory_error(_data: *mut c_void, file: *const c_char, location: *const c_char) {
    log::error!(
        "{}: out of memory in {}",
        lossy(file),
        lossy(location)
    );
}

unsafe extern "C" fn log_data_error(_data: *mut c_void, file: *const c_char, offset: c_int) {
    if offset < 0 {
        log::warn!("{}: unexpected end of file", lossy(file));
    } else {
        log::warn!("{}: data corrupted at {}", lossy(file), offset);
    }
}
