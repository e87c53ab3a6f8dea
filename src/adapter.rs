//! Bridges between foreign stream tables and [`DataStream`].
//!
//! Two directions:
//!
//! - [`ForeignStream`] makes a caller-supplied [`ZenRawDataStream`] usable
//!   as an engine stream. A missing function pointer answers with the
//!   failure sentinel (`-1`, or `None` for `gets`/`legacy_stream`), except
//!   `valid`, which treats absence as "valid".
//! - [`wrap_stream`] fills a [`ZenRawDataStream`] whose functions forward
//!   to an engine stream slot, so foreign code (an EXIF hook, say) can read
//!   from the stream the engine is parsing.

use core::ffi::{CStr, c_char, c_int, c_void};
use core::ptr::{self, NonNull};

use crate::stream::{DataStream, ScanTarget, StreamSlot};

/// Foreign stream descriptor: an opaque context pointer plus one optional
/// function pointer per stream operation. Every function receives
/// `user_data` as its last argument.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct ZenRawDataStream {
    pub user_data: *mut c_void,
    pub valid: Option<unsafe extern "C" fn(user_data: *mut c_void) -> c_int>,
    pub read: Option<
        unsafe extern "C" fn(
            dst: *mut c_void,
            size: usize,
            count: usize,
            user_data: *mut c_void,
        ) -> c_int,
    >,
    pub seek:
        Option<unsafe extern "C" fn(offset: i64, whence: c_int, user_data: *mut c_void) -> c_int>,
    pub tell: Option<unsafe extern "C" fn(user_data: *mut c_void) -> i64>,
    pub size: Option<unsafe extern "C" fn(user_data: *mut c_void) -> i64>,
    pub get_char: Option<unsafe extern "C" fn(user_data: *mut c_void) -> c_int>,
    pub gets: Option<
        unsafe extern "C" fn(s: *mut c_char, size: c_int, user_data: *mut c_void) -> *mut c_char,
    >,
    pub scanf_one: Option<
        unsafe extern "C" fn(
            fmt: *const c_char,
            arg: *mut c_void,
            user_data: *mut c_void,
        ) -> c_int,
    >,
    pub eof: Option<unsafe extern "C" fn(user_data: *mut c_void) -> c_int>,
    pub legacy_stream: Option<unsafe extern "C" fn(user_data: *mut c_void) -> *mut c_void>,
}

impl Default for ZenRawDataStream {
    fn default() -> Self {
        Self {
            user_data: ptr::null_mut(),
            valid: None,
            read: None,
            seek: None,
            tell: None,
            size: None,
            get_char: None,
            gets: None,
            scanf_one: None,
            eof: None,
            legacy_stream: None,
        }
    }
}

/// A foreign stream table seen as a [`DataStream`].
///
/// The table is copied at construction; the caller only has to keep
/// `user_data` alive while the engine uses the stream.
pub struct ForeignStream {
    table: ZenRawDataStream,
}

impl ForeignStream {
    /// # Safety
    ///
    /// Every present function pointer must be safe to call with
    /// `table.user_data` for as long as this stream lives.
    pub unsafe fn new(table: &ZenRawDataStream) -> Self {
        Self { table: *table }
    }
}

impl DataStream for ForeignStream {
    fn valid(&mut self) -> bool {
        match self.table.valid {
            // SAFETY: contract of `ForeignStream::new`.
            Some(f) => unsafe { f(self.table.user_data) != 0 },
            None => true,
        }
    }

    fn read(&mut self, dst: &mut [u8], size: usize, count: usize) -> c_int {
        let Some(f) = self.table.read else {
            return -1;
        };
        // The foreign reader fills `size * count` bytes unchecked.
        if size.checked_mul(count).is_none_or(|bytes| bytes > dst.len()) {
            return -1;
        }
        // SAFETY: contract of `ForeignStream::new`; `dst` holds at least
        // `size * count` bytes.
        unsafe { f(dst.as_mut_ptr().cast(), size, count, self.table.user_data) }
    }

    fn seek(&mut self, offset: i64, whence: c_int) -> c_int {
        match self.table.seek {
            // SAFETY: contract of `ForeignStream::new`.
            Some(f) => unsafe { f(offset, whence, self.table.user_data) },
            None => -1,
        }
    }

    fn tell(&mut self) -> i64 {
        match self.table.tell {
            // SAFETY: contract of `ForeignStream::new`.
            Some(f) => unsafe { f(self.table.user_data) },
            None => -1,
        }
    }

    fn size(&mut self) -> i64 {
        match self.table.size {
            // SAFETY: contract of `ForeignStream::new`.
            Some(f) => unsafe { f(self.table.user_data) },
            None => -1,
        }
    }

    fn get_char(&mut self) -> c_int {
        match self.table.get_char {
            // SAFETY: contract of `ForeignStream::new`.
            Some(f) => unsafe { f(self.table.user_data) },
            None => -1,
        }
    }

    fn gets(&mut self, buf: &mut [u8]) -> Option<usize> {
        let f = self.table.gets?;
        if buf.is_empty() {
            return None;
        }
        let size = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        // SAFETY: contract of `ForeignStream::new`; `buf` holds `size` bytes.
        let ret = unsafe { f(buf.as_mut_ptr().cast(), size, self.table.user_data) };
        if ret.is_null() {
            return None;
        }
        let end = buf.len() - 1;
        buf[end] = 0;
        buf.iter().position(|&b| b == 0)
    }

    fn scanf_one(&mut self, target: ScanTarget<'_>) -> c_int {
        let Some(f) = self.table.scanf_one else {
            return -1;
        };
        let user = self.table.user_data;
        // SAFETY: contract of `ForeignStream::new`; each format matches the
        // type of the destination it is paired with.
        unsafe {
            match target {
                ScanTarget::Int(out) => f(c"%d".as_ptr(), ptr::from_mut(out).cast(), user),
                ScanTarget::Float(out) => f(c"%f".as_ptr(), ptr::from_mut(out).cast(), user),
            }
        }
    }

    fn eof(&mut self) -> c_int {
        match self.table.eof {
            // SAFETY: contract of `ForeignStream::new`.
            Some(f) => unsafe { f(self.table.user_data) },
            None => -1,
        }
    }

    fn legacy_stream(&mut self) -> Option<NonNull<c_void>> {
        let f = self.table.legacy_stream?;
        // SAFETY: contract of `ForeignStream::new`.
        NonNull::new(unsafe { f(self.table.user_data) })
    }

    fn name(&self) -> &CStr {
        c"custom stream"
    }
}

/// Fill `dst` with functions forwarding to the engine stream at `slot`.
///
/// # Safety
///
/// `slot` must point to a live [`StreamSlot`] for as long as `dst` is used,
/// and nothing else may access that slot during a forwarded call.
pub unsafe fn wrap_stream(slot: *mut StreamSlot, dst: &mut ZenRawDataStream) {
    *dst = ZenRawDataStream {
        user_data: slot.cast(),
        valid: Some(wrapped_valid),
        read: Some(wrapped_read),
        seek: Some(wrapped_seek),
        tell: Some(wrapped_tell),
        size: Some(wrapped_size),
        get_char: Some(wrapped_get_char),
        gets: Some(wrapped_gets),
        scanf_one: Some(wrapped_scanf_one),
        eof: Some(wrapped_eof),
        legacy_stream: Some(wrapped_legacy_stream),
    };
}

/// # Safety
///
/// `user` is null or was produced by [`wrap_stream`].
unsafe fn slot<'a>(user: *mut c_void) -> Option<&'a mut StreamSlot> {
    // SAFETY: see the function contract.
    unsafe { user.cast::<StreamSlot>().as_mut() }
}

unsafe extern "C" fn wrapped_valid(user: *mut c_void) -> c_int {
    // SAFETY: installed by `wrap_stream`.
    unsafe { slot(user) }.map_or(0, |s| s.valid() as c_int)
}

unsafe extern "C" fn wrapped_read(
    dst: *mut c_void,
    size: usize,
    count: usize,
    user: *mut c_void,
) -> c_int {
    // SAFETY: installed by `wrap_stream`.
    let Some(stream) = (unsafe { slot(user) }) else {
        return -1;
    };
    let len = size.saturating_mul(count);
    if len == 0 {
        return 0;
    }
    if dst.is_null() {
        return -1;
    }
    // SAFETY: the foreign caller provides `size * count` writable bytes.
    let buf = unsafe { core::slice::from_raw_parts_mut(dst.cast::<u8>(), len) };
    stream.read(buf, size, count)
}

unsafe extern "C" fn wrapped_seek(offset: i64, whence: c_int, user: *mut c_void) -> c_int {
    // SAFETY: installed by `wrap_stream`.
    unsafe { slot(user) }.map_or(-1, |s| s.seek(offset, whence))
}

unsafe extern "C" fn wrapped_tell(user: *mut c_void) -> i64 {
    // SAFETY: installed by `wrap_stream`.
    unsafe { slot(user) }.map_or(-1, |s| s.tell())
}

unsafe extern "C" fn wrapped_size(user: *mut c_void) -> i64 {
    // SAFETY: installed by `wrap_stream`.
    unsafe { slot(user) }.map_or(-1, |s| s.size())
}

unsafe extern "C" fn wrapped_get_char(user: *mut c_void) -> c_int {
    // SAFETY: installed by `wrap_stream`.
    unsafe { slot(user) }.map_or(-1, |s| s.get_char())
}

unsafe extern "C" fn wrapped_gets(s: *mut c_char, size: c_int, user: *mut c_void) -> *mut c_char {
    // SAFETY: installed by `wrap_stream`.
    let Some(stream) = (unsafe { slot(user) }) else {
        return ptr::null_mut();
    };
    let Ok(len) = usize::try_from(size) else {
        return ptr::null_mut();
    };
    if s.is_null() || len == 0 {
        return ptr::null_mut();
    }
    // SAFETY: the foreign caller provides `size` writable bytes.
    let buf = unsafe { core::slice::from_raw_parts_mut(s.cast::<u8>(), len) };
    match stream.gets(buf) {
        Some(_) => s,
        None => ptr::null_mut(),
    }
}

unsafe extern "C" fn wrapped_scanf_one(
    fmt: *const c_char,
    arg: *mut c_void,
    user: *mut c_void,
) -> c_int {
    // SAFETY: installed by `wrap_stream`.
    let Some(stream) = (unsafe { slot(user) }) else {
        return -1;
    };
    if fmt.is_null() || arg.is_null() {
        return -1;
    }
    // SAFETY: the foreign caller passes a NUL-terminated format.
    let fmt = unsafe { CStr::from_ptr(fmt) }.to_bytes();
    match fmt {
        // SAFETY: `%d` pairs with an int destination.
        b"%d" => stream.scanf_one(ScanTarget::Int(unsafe { &mut *arg.cast::<c_int>() })),
        // SAFETY: `%f` pairs with a float destination.
        b"%f" => stream.scanf_one(ScanTarget::Float(unsafe { &mut *arg.cast::<f32>() })),
        _ => {
            log::debug!("unsupported scanf format {:?}", String::from_utf8_lossy(fmt));
            -1
        }
    }
}

unsafe extern "C" fn wrapped_eof(user: *mut c_void) -> c_int {
    // SAFETY: installed by `wrap_stream`.
    unsafe { slot(user) }.map_or(-1, |s| s.eof())
}

unsafe extern "C" fn wrapped_legacy_stream(user: *mut c_void) -> *mut c_void {
    // SAFETY: installed by `wrap_stream`.
    unsafe { slot(user) }
        .and_then(|s| s.legacy_stream())
        .map_or(ptr::null_mut(), NonNull::as_ptr)
}
