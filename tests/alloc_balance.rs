//! Every allocation made behind the C API is released by the matching
//! release call.

mod common;

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use zenraw::capi::*;
use zenraw::error::SUCCESS;

struct Counting;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

fn track(delta: isize) {
    let _ = LIVE.try_with(|live| live.set(live.get() + delta));
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            track(layout.size() as isize);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        track(-(layout.size() as isize));
        unsafe { System.dealloc(ptr, layout) };
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new = unsafe { System.realloc(ptr, layout, new_size) };
        if !new.is_null() {
            track(new_size as isize - layout.size() as isize);
        }
        new
    }
}

#[global_allocator]
static ALLOCATOR: Counting = Counting;

fn live() -> isize {
    LIVE.with(Cell::get)
}

/// Full session on one handle.
fn session(bytes: &[u8], missing: &std::ffi::CStr) {
    unsafe {
        let handle = zenraw_init(0);
        assert!(!handle.is_null());
        assert_ne!(zenraw_open_file(handle, missing.as_ptr()), SUCCESS);
        assert_eq!(zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len()), SUCCESS);
        assert_eq!(zenraw_unpack(handle), SUCCESS);
        assert_eq!(zenraw_unpack_thumb(handle), SUCCESS);
        assert_eq!(zenraw_process(handle), SUCCESS);
        let mut errc = -1;
        let image = zenraw_make_mem_image(handle, &mut errc);
        assert_eq!(errc, SUCCESS);
        let thumb = zenraw_make_mem_thumb(handle, &mut errc);
        assert_eq!(errc, SUCCESS);
        zenraw_clear_mem(image);
        zenraw_clear_mem(thumb);
        zenraw_close(handle);
    }
}

#[test]
fn session_releases_everything() {
    let bytes = common::mosaic_with_thumbnail(8, 6);
    let missing = c"definitely-missing.raw";
    // Warm up lazily initialised runtime state first.
    session(&bytes, missing);

    let before = live();
    session(&bytes, missing);
    assert_eq!(live(), before);
}

#[test]
fn recycle_releases_input_and_buffers() {
    let bytes = common::mosaic(8, 6);
    unsafe {
        let handle = zenraw_init(0);
        let before = live();
        for _ in 0..3 {
            zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len());
            zenraw_unpack(handle);
            zenraw_process(handle);
            assert_eq!(zenraw_recycle(handle), SUCCESS);
            assert_eq!(live(), before);
        }
        zenraw_close(handle);
    }
}
