mod common;

use core::ffi::{CStr, c_char, c_int, c_uint, c_void};
use core::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use zenraw::capi::*;
use zenraw::error::{
    CANCELLED_BY_CALLBACK, FILE_UNSUPPORTED, NO_THUMBNAIL, OUT_OF_ORDER_CALL, SUCCESS,
};
use zenraw::info::DecoderInfo;
use zenraw::stream::SEEK_SET;
use zenraw::{BAYER_BIG_ENDIAN, OutputColor, PATTERN_RGGB, Progress, ZenRawDataStream};

#[test]
fn missing_file_reports_an_error() {
    unsafe {
        let handle = zenraw_init(0);
        assert!(!handle.is_null());
        assert_ne!(zenraw_open_file(handle, c"missing.raw".as_ptr()), SUCCESS);
        assert_eq!(zenraw_unpack(handle), OUT_OF_ORDER_CALL);
        zenraw_close(handle);
    }
}

#[test]
fn non_raw_data_is_unsupported() {
    let bytes = b"II*\0\x08\0\0\0not really a tiff";
    unsafe {
        let handle = zenraw_init(0);
        assert_eq!(
            zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len()),
            FILE_UNSUPPORTED
        );
        zenraw_close(handle);
    }
}

unsafe extern "C" fn count_progress(
    data: *mut c_void,
    _stage: c_int,
    _iteration: c_int,
    _expected: c_int,
) -> c_int {
    let counter = unsafe { &*data.cast::<AtomicUsize>() };
    counter.fetch_add(1, Ordering::Relaxed);
    0
}

#[test]
fn progress_callback_runs_during_open_and_unpack() {
    let bytes = common::mosaic(4, 4);
    let calls = AtomicUsize::new(0);
    unsafe {
        let handle = zenraw_init(0);
        let data = ptr::from_ref(&calls).cast_mut().cast();
        assert_eq!(zenraw_set_progress_handler(handle, Some(count_progress), data), SUCCESS);
        assert_eq!(zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len()), SUCCESS);
        let after_open = calls.load(Ordering::Relaxed);
        assert!(after_open >= 1);
        assert_eq!(zenraw_unpack(handle), SUCCESS);
        assert!(calls.load(Ordering::Relaxed) > after_open);
        zenraw_close(handle);
    }
}

unsafe extern "C" fn cancel_load_raw(
    _data: *mut c_void,
    stage: c_int,
    _iteration: c_int,
    _expected: c_int,
) -> c_int {
    (stage == Progress::LoadRaw as c_int) as c_int
}

#[test]
fn progress_callback_can_cancel() {
    let bytes = common::mosaic(4, 4);
    unsafe {
        let handle = zenraw_init(0);
        zenraw_set_progress_handler(handle, Some(cancel_load_raw), ptr::null_mut());
        assert_eq!(zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len()), SUCCESS);
        assert_eq!(zenraw_unpack(handle), CANCELLED_BY_CALLBACK);
        // Clearing the handler lets the same stage run.
        zenraw_set_progress_handler(handle, None, ptr::null_mut());
        assert_eq!(zenraw_unpack(handle), SUCCESS);
        zenraw_close(handle);
    }
}

#[test]
fn mem_image_after_process() {
    let bytes = common::mosaic(6, 4);
    unsafe {
        let handle = zenraw_init(0);
        assert_eq!(zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len()), SUCCESS);
        let mut errc = -1;
        assert!(zenraw_make_mem_image(handle, &mut errc).is_null());
        assert_eq!(errc, OUT_OF_ORDER_CALL);

        assert_eq!(zenraw_unpack(handle), SUCCESS);
        assert_eq!(zenraw_process(handle), SUCCESS);
        assert_eq!(zenraw_get_iwidth(handle), 6);
        assert_eq!(zenraw_get_iheight(handle), 4);

        let image = zenraw_make_mem_image(handle, &mut errc);
        assert!(!image.is_null());
        assert_eq!(errc, SUCCESS);
        let header = &*image;
        assert_eq!(header.image_type, zenraw::output::IMAGE_BITMAP);
        assert_eq!((header.width, header.height, header.colors, header.bits), (6, 4, 3, 8));
        assert_eq!(header.data_size, 6 * 4 * 3);
        assert!(header.as_slice().iter().any(|&b| b > 0));
        zenraw_clear_mem(image);
        zenraw_close(handle);
    }
}

#[test]
fn sixteen_bit_xyz_output() {
    let bytes = common::mosaic(4, 4);
    unsafe {
        let handle = zenraw_init(0);
        zenraw_set_output_bps(handle, 16);
        zenraw_set_output_color(handle, OutputColor::Xyz as c_int);
        zenraw_set_noise_reduction(handle, 1);
        zenraw_set_highlight(handle, 2);
        zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len());
        zenraw_unpack(handle);
        assert_eq!(zenraw_process(handle), SUCCESS);
        let mut errc = -1;
        let image = zenraw_make_mem_image(handle, &mut errc);
        assert_eq!(errc, SUCCESS);
        assert_eq!((*image).bits, 16);
        assert_eq!((*image).data_size, 4 * 4 * 3 * 2);
        zenraw_clear_mem(image);
        zenraw_close(handle);
    }
}

#[test]
fn unsupported_color_space_is_not_implemented() {
    let bytes = common::mosaic(4, 4);
    unsafe {
        let handle = zenraw_init(0);
        zenraw_set_output_color(handle, OutputColor::Adobe as c_int);
        zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len());
        zenraw_unpack(handle);
        assert_eq!(zenraw_process(handle), zenraw::error::NOT_IMPLEMENTED);
        zenraw_close(handle);
    }
}

#[test]
fn step_by_step_pipeline() {
    let bytes = common::mosaic(4, 4);
    unsafe {
        let handle = zenraw_init(0);
        assert_eq!(zenraw_raw2image(handle), OUT_OF_ORDER_CALL);
        assert_eq!(zenraw_color(handle, 0, 0), 6);
        zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len());

        zenraw_set_half_size(handle, 1);
        assert_eq!(zenraw_adjust_sizes_info_only(handle), SUCCESS);
        assert_eq!((zenraw_get_iwidth(handle), zenraw_get_iheight(handle)), (2, 2));
        zenraw_set_half_size(handle, 0);

        // RGGB
        assert_eq!(zenraw_color(handle, 0, 0), 0);
        assert_eq!(zenraw_color(handle, 0, 1), 1);
        assert_eq!(zenraw_color(handle, 1, 0), 1);
        assert_eq!(zenraw_color(handle, 1, 1), 2);

        let mut info = DecoderInfo {
            decoder_name: ptr::null(),
            decoder_flags: 0,
        };
        assert_eq!(zenraw_get_decoder_info(handle, &mut info), SUCCESS);
        assert_eq!(CStr::from_ptr(info.decoder_name), c"pgm_load_raw()");
        assert_eq!(zenraw_get_decoder_info(handle, ptr::null_mut()), zenraw::error::EINVAL);

        assert_eq!(zenraw_unpack(handle), SUCCESS);
        assert_eq!(zenraw_raw2image(handle), SUCCESS);
        assert_eq!(zenraw_subtract_black(handle), SUCCESS);
        assert_eq!(zenraw_get_color_maxval(handle), 251);
        assert_eq!(zenraw_free_image(handle), SUCCESS);
        assert_eq!(zenraw_subtract_black(handle), OUT_OF_ORDER_CALL);
        zenraw_close(handle);
    }
}

#[test]
fn thumbnails() {
    let plain = common::mosaic(4, 4);
    let with_thumb = common::mosaic_with_thumbnail(4, 4);
    let dir = tempfile::tempdir().unwrap();
    let out = common::c_path(&dir.path().join("thumb.ppm"));
    unsafe {
        let handle = zenraw_init(0);
        zenraw_open_buffer(handle, plain.as_ptr().cast(), plain.len());
        assert_eq!(zenraw_unpack_thumb(handle), NO_THUMBNAIL);

        zenraw_open_buffer(handle, with_thumb.as_ptr().cast(), with_thumb.len());
        assert_eq!(zenraw_write_thumb(handle, out.as_ptr()), OUT_OF_ORDER_CALL);
        assert_eq!(zenraw_unpack_thumb(handle), SUCCESS);
        let mut errc = -1;
        let thumb = zenraw_make_mem_thumb(handle, &mut errc);
        assert_eq!(errc, SUCCESS);
        assert_eq!(((*thumb).width, (*thumb).height, (*thumb).colors), (2, 2, 3));
        assert_eq!((*thumb).as_slice()[..3], [0, 20, 40]);
        zenraw_clear_mem(thumb);

        assert_eq!(zenraw_write_thumb(handle, out.as_ptr()), SUCCESS);
        zenraw_close(handle);
    }
    let written = std::fs::read(dir.path().join("thumb.ppm")).unwrap();
    assert!(written.starts_with(b"P6\n2 2\n255\n"));
    assert_eq!(written.len(), 11 + 12);
}

#[test]
fn write_image_ppm_and_tiff() {
    let bytes = common::mosaic(4, 4);
    let dir = tempfile::tempdir().unwrap();
    let ppm = dir.path().join("out.ppm");
    let tiff = dir.path().join("out.tiff");
    unsafe {
        let handle = zenraw_init(0);
        zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len());
        assert_eq!(
            zenraw_write_image(handle, common::c_path(&ppm).as_ptr()),
            OUT_OF_ORDER_CALL
        );
        zenraw_unpack(handle);
        zenraw_process(handle);
        assert_eq!(zenraw_write_image(handle, common::c_path(&ppm).as_ptr()), SUCCESS);
        zenraw_set_output_tif(handle, 1);
        assert_eq!(zenraw_write_image(handle, common::c_path(&tiff).as_ptr()), SUCCESS);
        zenraw_close(handle);
    }
    let ppm = std::fs::read(ppm).unwrap();
    assert!(ppm.starts_with(b"P6\n4 4\n255\n"));
    assert_eq!(ppm.len(), 11 + 4 * 4 * 3);
    let tiff = std::fs::read(tiff).unwrap();
    assert_eq!(&tiff[..4], b"II*\0");
    assert!(tiff.len() > 4 * 4 * 3);
}

#[test]
fn bayer_dump_end_to_end() {
    let samples: Vec<u8> = (0..16u16).flat_map(|v| (v * 1000).to_be_bytes()).collect();
    unsafe {
        let handle = zenraw_init(0);
        assert_eq!(
            zenraw_open_bayer(
                handle,
                samples.as_ptr(),
                samples.len() as c_uint,
                4,
                4,
                0,
                0,
                0,
                0,
                BAYER_BIG_ENDIAN,
                PATTERN_RGGB,
                0,
                0,
                0,
            ),
            SUCCESS
        );
        assert_eq!(CStr::from_ptr(zenraw_unpack_function_name(handle)), c"bayer_load_raw()");
        assert_eq!(zenraw_get_raw_width(handle), 4);
        assert_eq!(zenraw_get_color_maxval(handle), 0xffff);
        assert_eq!(zenraw_unpack(handle), SUCCESS);
        assert_eq!(zenraw_process(handle), SUCCESS);
        zenraw_close(handle);
    }
}

struct Seen {
    tags: Vec<(c_int, Vec<u8>)>,
}

unsafe extern "C" fn read_tag(
    context: *mut c_void,
    tag: c_int,
    tag_type: c_int,
    len: c_int,
    ord: c_uint,
    ifp: *mut c_void,
    base: i64,
) {
    assert_eq!(tag_type, zenraw::callbacks::EXIF_TYPE_ASCII);
    assert_eq!(ord, zenraw::callbacks::EXIF_ORDER_MM);
    assert_eq!(base, 0);
    let seen = unsafe { &mut *context.cast::<Seen>() };
    let mut table = ZenRawDataStream::default();
    assert_eq!(unsafe { zenraw_wrap_stream(ifp, &mut table) }, SUCCESS);
    let mut value = vec![0u8; len as usize];
    let read = unsafe { table.read.unwrap()(value.as_mut_ptr().cast(), 1, value.len(), table.user_data) };
    assert_eq!(read, len);
    seen.tags.push((tag, value));
    // The engine restores the position itself.
    unsafe { table.seek.unwrap()(0, SEEK_SET, table.user_data) };
}

#[test]
fn exif_parser_reads_values_through_wrapped_stream() {
    let bytes = common::mosaic(4, 4);
    let mut seen = Seen { tags: Vec::new() };
    unsafe {
        let handle = zenraw_init(0);
        zenraw_set_exifparser_handler(handle, Some(read_tag), ptr::from_mut(&mut seen).cast());
        assert_eq!(zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len()), SUCCESS);
        assert_eq!(zenraw_get_raw_width(handle), 4);
        zenraw_close(handle);
    }
    assert_eq!(seen.tags.len(), 5);
    assert_eq!(seen.tags[0], (0x010f, b"Zen".to_vec()));
    assert_eq!(seen.tags[1], (0x0110, b"Fixture".to_vec()));
}

unsafe extern "C" fn record_data_error(data: *mut c_void, file: *const c_char, offset: c_int) {
    let out = unsafe { &mut *data.cast::<Option<(String, c_int)>>() };
    let file = unsafe { CStr::from_ptr(file) }.to_string_lossy().into_owned();
    *out = Some((file, offset));
}

#[test]
fn truncated_data_fires_data_error() {
    let mut bytes = common::mosaic(4, 4);
    bytes.truncate(bytes.len() - 5);
    let mut report: Option<(String, c_int)> = None;
    unsafe {
        let handle = zenraw_init(0);
        zenraw_set_dataerror_handler(
            handle,
            Some(record_data_error),
            ptr::from_mut(&mut report).cast(),
        );
        zenraw_open_buffer(handle, bytes.as_ptr().cast(), bytes.len());
        assert_eq!(zenraw_unpack(handle), SUCCESS);
        zenraw_close(handle);
    }
    assert_eq!(report, Some(("buffer".to_owned(), bytes.len() as c_int)));
}
