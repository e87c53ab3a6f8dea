//! Input identification.
//!
//! Fills the metadata records and returns a [`Layout`] telling `unpack`
//! where the mosaic and thumbnail live. Netpbm headers are parsed through
//! the [`DataStream`](crate::stream::DataStream) primitives so that foreign
//! streams see the same call pattern as built-in ones.

use core::ffi::{c_int, c_void};
use core::ptr;
use std::io;

use crate::callbacks::CallbackRegistry;
use crate::error::{RawError, Result};
use crate::format::RawFormat;
use crate::info::{ColorData, ImageParams, ImageSizes, ImgOther, LensInfo, set_cstr};
use crate::limits::RawLimits;
use crate::stream::{SEEK_CUR, SEEK_SET, ScanTarget, StreamSlot};

use super::cfa;

/// Longest metadata comment line kept; the rest of a longer line is skipped.
const COMMENT_LINE: usize = 1024;

/// Everything identification learns about the input.
#[derive(Clone, Debug, Default)]
pub(crate) struct Metadata {
    pub idata: ImageParams,
    pub lens: LensInfo,
    pub other: ImgOther,
    pub sizes: ImageSizes,
    pub color: ColorData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Decoder {
    Pgm,
    Bayer,
}

impl Decoder {
    pub fn name(self) -> &'static core::ffi::CStr {
        match self {
            Decoder::Pgm => c"pgm_load_raw()",
            Decoder::Bayer => c"bayer_load_raw()",
        }
    }
}

/// Embedded 8-bit Netpbm thumbnail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ThumbLayout {
    pub offset: i64,
    pub width: u16,
    pub height: u16,
    /// 1 for PGM, 3 for PPM.
    pub colors: u16,
}

/// Where and how the mosaic is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Layout {
    pub decoder: Decoder,
    pub data_offset: i64,
    pub bytes_per_sample: usize,
    pub big_endian: bool,
    pub thumb: Option<ThumbLayout>,
}

/// Caller-described Bayer dump, as passed to `zenraw_open_bayer`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BayerDump {
    pub raw_width: u16,
    pub raw_height: u16,
    pub left_margin: u16,
    pub top_margin: u16,
    pub right_margin: u16,
    pub bottom_margin: u16,
    /// Bit 0: 16-bit samples are big-endian.
    pub procflags: u8,
    /// One of the `PATTERN_*` bytes.
    pub bayer_pattern: u8,
    /// High bits never set by the sensor.
    pub unused_bits: u32,
    /// Bit 0: samples are single bytes.
    pub otherflags: u32,
    pub black_level: u32,
}

pub const BAYER_BIG_ENDIAN: u8 = 1;
pub const BAYER_8BIT: u32 = 1;

fn io_error(what: &str) -> RawError {
    RawError::Io(io::Error::other(what.to_owned()))
}

/// Identify a Netpbm Bayer mosaic at the start of `stream`.
pub(crate) fn identify_netpbm(
    stream: &mut StreamSlot,
    callbacks: &CallbackRegistry,
    limits: &RawLimits,
    meta: &mut Metadata,
) -> Result<Layout> {
    if stream.seek(0, SEEK_SET) != 0 {
        return Err(io_error("cannot rewind input"));
    }
    let mut probe = [0u8; RawFormat::PROBE_BYTES];
    let got = usize::try_from(stream.read(&mut probe, 1, RawFormat::PROBE_BYTES))
        .map_err(|_| io_error("cannot read input"))?;
    match RawFormat::detect(&probe[..got]) {
        Some(format) if format.is_supported() => {}
        Some(other) => return Err(RawError::FileUnsupported(other.name())),
        None => return Err(RawError::FileUnsupported("unrecognized data")),
    }
    if stream.seek(2, SEEK_SET) != 0 {
        return Err(io_error("cannot seek input"));
    }

    let mut header = Header {
        stream,
        callbacks,
        meta,
        margins: [0; 4],
    };
    let width = header.number()?;
    let height = header.number()?;
    let maxval = header.number()?;
    if maxval > u16::MAX as u32 {
        return Err(RawError::FileUnsupported("Netpbm maxval out of range"));
    }
    let c = header.stream.get_char();
    if c < 0 || !(c as u8).is_ascii_whitespace() {
        return Err(RawError::FileUnsupported("malformed Netpbm header"));
    }
    limits.check_dimensions(width, height)?;

    let Header {
        stream,
        meta,
        margins,
        ..
    } = header;
    let data_offset = stream.tell();
    if data_offset < 0 {
        return Err(io_error("cannot tell input position"));
    }
    let bytes_per_sample = if maxval < 256 { 1 } else { 2 };
    let data_len = width as i64 * height as i64 * bytes_per_sample as i64;
    let thumb = probe_thumbnail(stream, data_offset + data_len);

    if meta.idata.filters == 0 {
        meta.idata.filters = cfa::filters_from_pattern(cfa::PATTERN_RGGB).unwrap_or_default();
    }
    if meta.color.maximum == 0 {
        meta.color.maximum = maxval;
    }
    set_geometry(meta, width as u16, height as u16, margins, bytes_per_sample)?;
    log::debug!(
        "Netpbm Bayer {}x{}, maxval {}, thumbnail {}",
        width,
        height,
        maxval,
        thumb.is_some()
    );

    Ok(Layout {
        decoder: Decoder::Pgm,
        data_offset,
        bytes_per_sample,
        big_endian: true,
        thumb,
    })
}

/// Describe a caller-supplied Bayer dump.
pub(crate) fn identify_bayer(
    dump: &BayerDump,
    limits: &RawLimits,
    meta: &mut Metadata,
) -> Result<Layout> {
    if dump.raw_width == 0 || dump.raw_height == 0 {
        return Err(RawError::FileUnsupported("empty Bayer geometry"));
    }
    limits.check_dimensions(dump.raw_width as u32, dump.raw_height as u32)?;
    let filters = cfa::filters_from_pattern(dump.bayer_pattern)
        .ok_or(RawError::FileUnsupported("unknown Bayer pattern"))?;

    let eight_bit = dump.otherflags & BAYER_8BIT != 0;
    let bits = if eight_bit { 8 } else { 16 };
    let unused = dump.unused_bits.min(bits - 1);

    set_cstr(&mut meta.idata.make, "BayerDump");
    meta.idata.filters = filters;
    meta.color.maximum = (1u32 << (bits - unused)) - 1;
    meta.color.black = dump.black_level;
    let bytes_per_sample = if eight_bit { 1 } else { 2 };
    set_geometry(
        meta,
        dump.raw_width,
        dump.raw_height,
        [
            dump.left_margin,
            dump.top_margin,
            dump.right_margin,
            dump.bottom_margin,
        ],
        bytes_per_sample,
    )?;

    Ok(Layout {
        decoder: Decoder::Bayer,
        data_offset: 0,
        bytes_per_sample,
        big_endian: dump.procflags & BAYER_BIG_ENDIAN != 0,
        thumb: None,
    })
}

/// Fill the size block and the fields both decoders share.
/// `margins` is `[left, top, right, bottom]`.
fn set_geometry(
    meta: &mut Metadata,
    raw_width: u16,
    raw_height: u16,
    margins: [u16; 4],
    bytes_per_sample: usize,
) -> Result<()> {
    let [left, top, right, bottom] = margins;
    let width = raw_width
        .checked_sub(left)
        .and_then(|w| w.checked_sub(right))
        .filter(|w| *w > 0)
        .ok_or(RawError::BadCrop)?;
    let height = raw_height
        .checked_sub(top)
        .and_then(|h| h.checked_sub(bottom))
        .filter(|h| *h > 0)
        .ok_or(RawError::BadCrop)?;

    let sizes = &mut meta.sizes;
    sizes.raw_width = raw_width;
    sizes.raw_height = raw_height;
    sizes.left_margin = left;
    sizes.top_margin = top;
    sizes.width = width;
    sizes.height = height;
    sizes.iwidth = width;
    sizes.iheight = height;
    sizes.raw_pitch = raw_width as u32 * bytes_per_sample as u32;
    sizes.pixel_aspect = 1.0;
    sizes.flip = 0;

    let idata = &mut meta.idata;
    idata.raw_count = 1;
    idata.colors = 3;
    idata.filters = cfa::shift_filters(idata.filters, top as usize, left as usize);
    for (dst, src) in idata.cdesc.iter_mut().zip(b"RGBG\0") {
        *dst = *src as core::ffi::c_char;
    }

    let color = &mut meta.color;
    if color.maximum == 0 {
        color.maximum = 1;
    }
    if color.pre_mul.iter().all(|m| *m <= 0.0) {
        color.pre_mul = [1.0, 1.0, 1.0, 0.0];
    }
    Ok(())
}

struct Header<'a> {
    stream: &'a mut StreamSlot,
    callbacks: &'a CallbackRegistry,
    meta: &'a mut Metadata,
    margins: [u16; 4],
}

impl Header<'_> {
    /// Next positive header integer, handling comments on the way.
    fn number(&mut self) -> Result<u32> {
        self.skip_blanks()?;
        let mut value: c_int = 0;
        match self.stream.scanf_one(ScanTarget::Int(&mut value)) {
            1 if value > 0 => Ok(value as u32),
            _ => Err(RawError::FileUnsupported("malformed Netpbm header")),
        }
    }

    fn skip_blanks(&mut self) -> Result<()> {
        loop {
            let c = self.stream.get_char();
            if c < 0 {
                return Err(RawError::FileUnsupported("truncated Netpbm header"));
            }
            let c = c as u8;
            if c == b'#' {
                self.comment();
            } else if !c.is_ascii_whitespace() {
                self.stream.seek(-1, SEEK_CUR);
                return Ok(());
            }
        }
    }

    /// Consume one comment line; `# key=value` lines are metadata.
    fn comment(&mut self) {
        let start = self.stream.tell();
        let mut line = [0u8; COMMENT_LINE];
        let Some(n) = self.stream.gets(&mut line) else {
            return;
        };
        if line[n.saturating_sub(1)] != b'\n' {
            loop {
                let c = self.stream.get_char();
                if c < 0 || c == b'\n' as c_int {
                    break;
                }
            }
        }
        let end = self.stream.tell();

        let text = line[..n].trim_ascii_end();
        let Some(eq) = text.iter().position(|&b| b == b'=') else {
            return;
        };
        let key = String::from_utf8_lossy(text[..eq].trim_ascii());
        let Some(field) = Field::from_key(&key) else {
            log::trace!("skipping unknown header key {key:?}");
            return;
        };
        let raw_value = &text[eq + 1..];
        let lead = raw_value.len() - raw_value.trim_ascii_start().len();
        let value = raw_value.trim_ascii();

        if self.callbacks.has_exif_parser() && start >= 0 && end >= 0 {
            let value_pos = start + (eq + 1 + lead) as i64;
            self.stream.seek(value_pos, SEEK_SET);
            let ifp = ptr::from_mut(&mut *self.stream).cast::<c_void>();
            self.callbacks.exif_tag(field.exif_tag(), value.len(), ifp);
            self.stream.seek(end, SEEK_SET);
        }

        let value = String::from_utf8_lossy(value);
        if field.apply(&value, self.meta, &mut self.margins).is_none() {
            log::warn!("ignoring malformed {key} value {value:?}");
        }
    }
}

/// Metadata keys understood in `# key=value` header comments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Make,
    Model,
    Software,
    Iso,
    Shutter,
    Aperture,
    Focal,
    Timestamp,
    Shot,
    Artist,
    Desc,
    Lens,
    LensMake,
    Black,
    Maximum,
    Pattern,
    CamMul,
    PreMul,
    RgbCam,
    Gps,
    Margins,
}

impl Field {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "make" => Field::Make,
            "model" => Field::Model,
            "software" => Field::Software,
            "iso" => Field::Iso,
            "shutter" => Field::Shutter,
            "aperture" => Field::Aperture,
            "focal" => Field::Focal,
            "timestamp" => Field::Timestamp,
            "shot" => Field::Shot,
            "artist" => Field::Artist,
            "desc" => Field::Desc,
            "lens" => Field::Lens,
            "lens_make" => Field::LensMake,
            "black" => Field::Black,
            "maximum" => Field::Maximum,
            "pattern" => Field::Pattern,
            "cam_mul" => Field::CamMul,
            "pre_mul" => Field::PreMul,
            "rgb_cam" => Field::RgbCam,
            "gps" => Field::Gps,
            "margins" => Field::Margins,
            _ => return None,
        })
    }

    /// EXIF (or DNG) tag the value corresponds to.
    fn exif_tag(self) -> c_int {
        match self {
            Field::Make => 0x010f,
            Field::Model => 0x0110,
            Field::Software => 0x0131,
            Field::Iso => 0x8827,
            Field::Shutter => 0x829a,
            Field::Aperture => 0x829d,
            Field::Focal => 0x920a,
            Field::Timestamp => 0x0132,
            Field::Shot => 0x9211,
            Field::Artist => 0x013b,
            Field::Desc => 0x010e,
            Field::Lens => 0xa434,
            Field::LensMake => 0xa433,
            Field::Black => 0xc61a,
            Field::Maximum => 0xc61d,
            Field::Pattern => 0x828e,
            Field::CamMul => 0xc628,
            Field::PreMul => 0xc627,
            Field::RgbCam => 0xc621,
            Field::Gps => 0x8825,
            Field::Margins => 0xc61f,
        }
    }

    /// Store `value`; `None` when it does not parse.
    fn apply(self, value: &str, meta: &mut Metadata, margins: &mut [u16; 4]) -> Option<()> {
        match self {
            Field::Make => set_cstr(&mut meta.idata.make, value),
            Field::Model => set_cstr(&mut meta.idata.model, value),
            Field::Software => set_cstr(&mut meta.idata.software, value),
            Field::Iso => meta.other.iso_speed = value.parse().ok()?,
            Field::Shutter => meta.other.shutter = parse_shutter(value)?,
            Field::Aperture => meta.other.aperture = value.parse().ok()?,
            Field::Focal => meta.other.focal_len = value.parse().ok()?,
            Field::Timestamp => meta.other.timestamp = value.parse().ok()?,
            Field::Shot => meta.other.shot_order = value.parse().ok()?,
            Field::Artist => set_cstr(&mut meta.other.artist, value),
            Field::Desc => set_cstr(&mut meta.other.desc, value),
            Field::Lens => set_cstr(&mut meta.lens.lens, value),
            Field::LensMake => set_cstr(&mut meta.lens.lens_make, value),
            Field::Black => meta.color.black = value.parse().ok()?,
            Field::Maximum => meta.color.maximum = value.parse().ok()?,
            Field::Pattern => meta.idata.filters = cfa::filters_from_name(value)?,
            Field::CamMul => parse_list(value, &mut meta.color.cam_mul, 1)?,
            Field::PreMul => parse_list(value, &mut meta.color.pre_mul, 1)?,
            Field::RgbCam => {
                let mut m = [0f32; 9];
                parse_list(value, &mut m, 9)?;
                for (row, chunk) in meta.color.rgb_cam.iter_mut().zip(m.chunks_exact(3)) {
                    row[..3].copy_from_slice(chunk);
                    row[3] = 0.0;
                }
            }
            Field::Gps => {
                meta.other.gpsdata = [0; 32];
                parse_list(value, &mut meta.other.gpsdata, 1)?;
            }
            Field::Margins => {
                let mut m = [0u16; 4];
                parse_list(value, &mut m, 4)?;
                *margins = m;
            }
        }
        Some(())
    }
}

/// `"0.004"` or `"1/250"`.
fn parse_shutter(value: &str) -> Option<f32> {
    match value.split_once('/') {
        Some((num, den)) => {
            let num: f32 = num.trim().parse().ok()?;
            let den: f32 = den.trim().parse().ok()?;
            (den != 0.0).then(|| num / den)
        }
        None => value.parse().ok(),
    }
}

/// Parse between `min` and `out.len()` whitespace-separated values into
/// the front of `out`.
fn parse_list<T: core::str::FromStr>(value: &str, out: &mut [T], min: usize) -> Option<()> {
    let mut count = 0;
    for token in value.split_ascii_whitespace() {
        let slot = out.get_mut(count)?;
        *slot = token.parse().ok()?;
        count += 1;
    }
    (count >= min).then_some(())
}

/// Look for a second Netpbm image (8-bit PGM or PPM) starting at `at`.
fn probe_thumbnail(stream: &mut StreamSlot, at: i64) -> Option<ThumbLayout> {
    let size = stream.size();
    if size <= at || stream.seek(at, SEEK_SET) != 0 {
        return None;
    }
    let mut magic = [0u8; 2];
    if stream.read(&mut magic, 1, 2) != 2 {
        return None;
    }
    let colors = match &magic {
        b"P5" => 1u16,
        b"P6" => 3,
        _ => return None,
    };
    let mut dims = [0 as c_int; 3];
    for d in &mut dims {
        if stream.scanf_one(ScanTarget::Int(d)) != 1 || *d <= 0 {
            return None;
        }
    }
    let [width, height, maxval] = dims;
    if maxval != 255 || width > u16::MAX as c_int || height > u16::MAX as c_int {
        log::debug!("ignoring trailing image {width}x{height}, maxval {maxval}");
        return None;
    }
    let c = stream.get_char();
    if c < 0 || !(c as u8).is_ascii_whitespace() {
        return None;
    }
    let offset = stream.tell();
    let len = width as i64 * height as i64 * colors as i64;
    if offset < 0 || offset + len > size {
        log::debug!("trailing thumbnail truncated");
        return None;
    }
    Some(ThumbLayout {
        offset,
        width: width as u16,
        height: height as u16,
        colors,
    })
}
