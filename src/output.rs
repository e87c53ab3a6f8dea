//! Rendered output: in-memory images and file writers.

use core::ffi::c_int;
use core::ptr;
use std::io::{self, Write};

use crate::error::{RawError, Result};
use crate::limits::LimitExceeded;

/// `ProcessedImage::image_type` for interleaved samples.
pub const IMAGE_BITMAP: c_int = 2;

/// Image handed to foreign callers by `zenraw_make_mem_image` and
/// `zenraw_make_mem_thumb`.
///
/// Bitmaps are interleaved, top row first; 16-bit samples are in host byte
/// order. Release with `zenraw_clear_mem`, never with the C allocator.
#[derive(Debug)]
#[repr(C)]
pub struct ProcessedImage {
    pub image_type: c_int,
    pub height: u16,
    pub width: u16,
    pub colors: u16,
    pub bits: u16,
    pub data_size: u32,
    pub data: *mut u8,
}

impl ProcessedImage {
    /// Move `data` behind a heap header and hand out the raw pointer.
    pub(crate) fn into_raw(
        width: u16,
        height: u16,
        colors: u16,
        bits: u16,
        data: Vec<u8>,
    ) -> Result<*mut ProcessedImage> {
        let data_size = u32::try_from(data.len()).map_err(|_| LimitExceeded::Memory {
            actual: data.len() as u64,
            max: u32::MAX as u64,
        })?;
        let data = Box::into_raw(data.into_boxed_slice()).cast::<u8>();
        Ok(Box::into_raw(Box::new(ProcessedImage {
            image_type: IMAGE_BITMAP,
            height,
            width,
            colors,
            bits,
            data_size,
            data,
        })))
    }

    /// Borrow the sample bytes.
    ///
    /// # Safety
    ///
    /// `self` must have been produced by the engine and not modified.
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.data.is_null() {
            return &[];
        }
        // SAFETY: see the function contract.
        unsafe { core::slice::from_raw_parts(self.data, self.data_size as usize) }
    }

    /// Release an image from [`ProcessedImage::into_raw`]. Null is ignored.
    ///
    /// # Safety
    ///
    /// `image` must come from `into_raw` and not have been freed.
    pub(crate) unsafe fn free(image: *mut ProcessedImage) {
        if image.is_null() {
            return;
        }
        // SAFETY: see the function contract.
        let header = unsafe { Box::from_raw(image) };
        if !header.data.is_null() {
            let slice = ptr::slice_from_raw_parts_mut(header.data, header.data_size as usize);
            // SAFETY: allocated as a boxed slice of exactly this length.
            drop(unsafe { Box::from_raw(slice) });
        }
    }
}

/// Byte order used when packing 16-bit samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    Native,
    Big,
    Little,
}

/// Pack samples into bytes: one byte each at 8 bits, two at 16.
pub(crate) fn pack(samples: &[u16], bits: u16, order: ByteOrder) -> Result<Vec<u8>> {
    let per_sample = if bits == 16 { 2 } else { 1 };
    let mut out = Vec::new();
    out.try_reserve_exact(samples.len() * per_sample)
        .map_err(|_| RawError::OutOfMemory("pack()"))?;
    if bits == 16 {
        for &s in samples {
            out.extend_from_slice(&match order {
                ByteOrder::Native => s.to_ne_bytes(),
                ByteOrder::Big => s.to_be_bytes(),
                ByteOrder::Little => s.to_le_bytes(),
            });
        }
    } else {
        out.extend(samples.iter().map(|&s| s as u8));
    }
    Ok(out)
}

/// Binary Netpbm: `P6` for three colors, `P5` for one. 16-bit data must be
/// big-endian.
pub(crate) fn write_pnm<W: Write>(
    out: &mut W,
    width: u16,
    height: u16,
    colors: u16,
    bits: u16,
    data: &[u8],
) -> io::Result<()> {
    let magic = if colors == 1 { "P5" } else { "P6" };
    let maxval = if bits == 16 { 65535 } else { 255 };
    write!(out, "{magic}\n{width} {height}\n{maxval}\n")?;
    out.write_all(data)?;
    out.flush()
}

const TIFF_ENTRIES: u16 = 10;
const TIFF_IFD_OFFSET: u32 = 8;
const TIFF_BITS_OFFSET: u32 = TIFF_IFD_OFFSET + 2 + TIFF_ENTRIES as u32 * 12 + 4;
const TIFF_DATA_OFFSET: u32 = TIFF_BITS_OFFSET + 6;

/// Baseline uncompressed RGB TIFF, little-endian, one strip.
pub(crate) fn write_tiff<W: Write>(
    out: &mut W,
    width: u16,
    height: u16,
    bits: u16,
    data: &[u8],
) -> io::Result<()> {
    let strip_bytes = u32::try_from(data.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "image too large for TIFF"))?;

    out.write_all(b"II*\0")?;
    out.write_all(&TIFF_IFD_OFFSET.to_le_bytes())?;
    out.write_all(&TIFF_ENTRIES.to_le_bytes())?;

    const SHORT: u16 = 3;
    const LONG: u16 = 4;
    let entries: [(u16, u16, u32, u32); TIFF_ENTRIES as usize] = [
        (256, LONG, 1, width as u32),
        (257, LONG, 1, height as u32),
        (258, SHORT, 3, TIFF_BITS_OFFSET),
        (259, SHORT, 1, 1),
        (262, SHORT, 1, 2),
        (273, LONG, 1, TIFF_DATA_OFFSET),
        (277, SHORT, 1, 3),
        (278, LONG, 1, height as u32),
        (279, LONG, 1, strip_bytes),
        (284, SHORT, 1, 1),
    ];
    for (tag, kind, count, value) in entries {
        out.write_all(&tag.to_le_bytes())?;
        out.write_all(&kind.to_le_bytes())?;
        out.write_all(&count.to_le_bytes())?;
        // Single SHORT values are left-justified in the value field.
        out.write_all(&value.to_le_bytes())?;
    }
    out.write_all(&0u32.to_le_bytes())?;
    for _ in 0..3 {
        out.write_all(&bits.to_le_bytes())?;
    }
    out.write_all(data)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_image_roundtrip_free() {
        let raw = ProcessedImage::into_raw(2, 1, 3, 8, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let image = unsafe { &*raw };
        assert_eq!(image.image_type, IMAGE_BITMAP);
        assert_eq!(image.data_size, 6);
        assert_eq!(unsafe { image.as_slice() }, &[1, 2, 3, 4, 5, 6]);
        unsafe { ProcessedImage::free(raw) };
        unsafe { ProcessedImage::free(ptr::null_mut()) };
    }

    #[test]
    fn pack_orders() {
        assert_eq!(pack(&[0x0102], 16, ByteOrder::Big).unwrap(), [1, 2]);
        assert_eq!(pack(&[0x0102], 16, ByteOrder::Little).unwrap(), [2, 1]);
        assert_eq!(
            pack(&[0x0102], 16, ByteOrder::Native).unwrap(),
            0x0102u16.to_ne_bytes()
        );
        assert_eq!(pack(&[7, 255], 8, ByteOrder::Big).unwrap(), [7, 255]);
    }

    #[test]
    fn pnm_header() {
        let mut out = Vec::new();
        write_pnm(&mut out, 2, 1, 3, 8, &[0; 6]).unwrap();
        assert!(out.starts_with(b"P6\n2 1\n255\n"));
        assert_eq!(out.len(), 11 + 6);

        let mut out = Vec::new();
        write_pnm(&mut out, 1, 1, 1, 16, &[0, 0]).unwrap();
        assert!(out.starts_with(b"P5\n1 1\n65535\n"));
    }

    #[test]
    fn tiff_layout() {
        let data = [9u8; 12];
        let mut out = Vec::new();
        write_tiff(&mut out, 2, 2, 8, &data).unwrap();
        assert_eq!(&out[..4], b"II*\0");
        assert_eq!(out.len(), TIFF_DATA_OFFSET as usize + data.len());
        assert_eq!(&out[TIFF_DATA_OFFSET as usize..], &data);
        let entries = u16::from_le_bytes([out[8], out[9]]);
        assert_eq!(entries, TIFF_ENTRIES);
        let first_tag = u16::from_le_bytes([out[10], out[11]]);
        assert_eq!(first_tag, 256);
        let bits_at = TIFF_BITS_OFFSET as usize;
        assert_eq!(u16::from_le_bytes([out[bits_at], out[bits_at + 1]]), 8);
    }
}
