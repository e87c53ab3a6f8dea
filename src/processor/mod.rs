//! The reference engine behind the C boundary.
//!
//! [`Processor`] is one decoding session: open an input, unpack the mosaic,
//! develop it, render it. Calls made out of order fail with
//! `OUT_OF_ORDER_CALL` instead of touching missing state; calls that need
//! the input after it was released fail with `INPUT_CLOSED`.
//!
//! Every stage reports to the progress callback at its start and end, and a
//! non-zero answer cancels the stage with `CANCELLED_BY_CALLBACK`.

mod cfa;
mod develop;
mod identify;

pub use cfa::{PATTERN_BGGR, PATTERN_GBRG, PATTERN_GRBG, PATTERN_RGGB};
pub use identify::{BAYER_8BIT, BAYER_BIG_ENDIAN, BayerDump};

use core::ffi::{CStr, c_int, c_uint};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use imgref::ImgVec;
use rgb::Rgb;

use crate::callbacks::CallbackRegistry;
use crate::error::{RawError, Result};
use crate::info::{
    ColorData, DECODER_8BIT, DECODER_FLATDATA, DecoderInfo, ImageParams, ImageSizes, ImgOther,
    LensInfo,
};
use crate::limits::RawLimits;
use crate::output::{self, ByteOrder, ProcessedImage};
use crate::params::{OutputColor, ProcessingParams};
use crate::progress::Progress;
use crate::stream::{self, BufferStream, SEEK_SET, StreamSlot};

use develop::{HISTOGRAM_BINS, Histogram, Image};
use identify::{Layout, Metadata, ThumbLayout};

/// Files up to this size are read into memory by `open_file`.
pub const DEFAULT_MAX_BUFFERED: u64 = 250 * 1024 * 1024;

/// Unpacked 8-bit thumbnail.
struct Thumbnail {
    pixels: ImgVec<Rgb<u8>>,
    /// 1 when the embedded image was grayscale.
    colors: u16,
}

/// One decoding session.
pub struct Processor {
    params: ProcessingParams,
    meta: Metadata,
    /// Color state as unpacked; each development run starts from it.
    raw_color: ColorData,
    callbacks: CallbackRegistry,
    flags: c_uint,
    stream: Option<StreamSlot>,
    layout: Option<Layout>,
    raw: Option<ImgVec<u16>>,
    image: Option<Image>,
    black_subtracted: bool,
    histogram: Option<Histogram>,
    thumb: Option<Thumbnail>,
    progress: u32,
}

impl Processor {
    /// A fresh session. Performs no heap allocation.
    pub fn new(flags: c_uint) -> Self {
        Self {
            params: ProcessingParams::default(),
            meta: Metadata::default(),
            raw_color: ColorData::default(),
            callbacks: CallbackRegistry::new(flags),
            flags,
            stream: None,
            layout: None,
            raw: None,
            image: None,
            black_subtracted: false,
            histogram: None,
            thumb: None,
            progress: 0,
        }
    }

    /// Drop everything learned from the current input. Parameters and
    /// callbacks are kept.
    pub fn recycle(&mut self) {
        self.meta = Metadata::default();
        self.raw_color = ColorData::default();
        self.stream = None;
        self.layout = None;
        self.raw = None;
        self.free_image();
        self.thumb = None;
        self.progress = 0;
    }

    /// Release the input stream only.
    pub fn recycle_datastream(&mut self) {
        self.stream = None;
    }

    pub fn params(&self) -> &ProcessingParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ProcessingParams {
        &mut self.params
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    pub fn image_params(&self) -> &ImageParams {
        &self.meta.idata
    }

    pub fn lens_info(&self) -> &LensInfo {
        &self.meta.lens
    }

    pub fn img_other(&self) -> &ImgOther {
        &self.meta.other
    }

    pub fn sizes(&self) -> &ImageSizes {
        &self.meta.sizes
    }

    pub fn color(&self) -> &ColorData {
        &self.meta.color
    }

    /// Bitmask of completed [`Progress`] stages.
    pub fn progress_flags(&self) -> u32 {
        self.progress
    }

    /// The open input, if any.
    pub fn stream_slot(&mut self) -> Option<&mut StreamSlot> {
        self.stream.as_mut()
    }

    fn limits(&self) -> RawLimits {
        RawLimits::for_raw_memory_mb(self.params.max_raw_memory_mb)
    }

    fn stage<T>(&mut self, stage: Progress, run: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        log::debug!("{}", stage.name().to_string_lossy());
        self.callbacks.progress(stage, 0, 2)?;
        let out = run(self)?;
        self.callbacks.progress(stage, 1, 2)?;
        self.progress |= stage.bit();
        Ok(out)
    }

    fn out_of_memory(&self, location: &'static CStr) -> RawError {
        let file = self.stream.as_ref().map_or(c"", |s| s.name());
        self.callbacks.memory_error(file, location);
        RawError::OutOfMemory(location.to_str().unwrap_or("allocation"))
    }

    // --- opening ---

    pub fn open_file(&mut self, path: &Path) -> Result<()> {
        self.open_file_ex(path, DEFAULT_MAX_BUFFERED)
    }

    /// Open a file, reading it into memory when it is no larger than
    /// `max_buffered` bytes.
    pub fn open_file_ex(&mut self, path: &Path, max_buffered: u64) -> Result<()> {
        self.recycle();
        let stream = stream::open_path(path, max_buffered)?;
        self.open_datastream(stream)
    }

    /// Open a copy of `data`.
    pub fn open_buffer(&mut self, data: &[u8]) -> Result<()> {
        self.open_datastream(Box::new(BufferStream::new(data.to_vec(), c"buffer")))
    }

    /// Open any stream; the processor owns it until recycled.
    pub fn open_datastream(&mut self, stream: StreamSlot) -> Result<()> {
        self.recycle();
        self.stream = Some(stream);
        let limits = self.limits();
        self.stage(Progress::Open, |p| p.check_input(&limits))?;
        let identified = self.stage(Progress::Identify, |p| {
            let stream = p.stream.as_mut().ok_or(RawError::InputClosed)?;
            identify::identify_netpbm(stream, &p.callbacks, &limits, &mut p.meta)
        });
        self.finish_open(identified)
    }

    /// Open a headerless Bayer mosaic described by `dump`.
    pub fn open_bayer(&mut self, data: &[u8], dump: &BayerDump) -> Result<()> {
        self.recycle();
        self.stream = Some(Box::new(BufferStream::new(data.to_vec(), c"bayer")));
        let limits = self.limits();
        self.stage(Progress::Open, |p| p.check_input(&limits))?;
        let identified = self.stage(Progress::Identify, |p| {
            identify::identify_bayer(dump, &limits, &mut p.meta)
        });
        self.finish_open(identified)
    }

    fn check_input(&mut self, limits: &RawLimits) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(RawError::InputClosed)?;
        if !stream.valid() {
            return Err(RawError::Io(io::Error::other("input stream is not valid")));
        }
        let size = stream.size();
        if size >= 0 {
            limits.check_file_size(size as u64)?;
        }
        Ok(())
    }

    fn finish_open(&mut self, identified: Result<Layout>) -> Result<()> {
        match identified {
            Ok(layout) => {
                self.layout = Some(layout);
                Ok(())
            }
            Err(err) => {
                self.meta = Metadata::default();
                Err(err)
            }
        }
    }

    fn layout(&self, call: &'static str) -> Result<Layout> {
        self.layout.ok_or(RawError::OutOfOrder(call))
    }

    // --- unpacking ---

    /// Read the mosaic into memory.
    pub fn unpack(&mut self) -> Result<()> {
        let layout = self.layout("unpack() before open")?;
        if self.stream.is_none() {
            return Err(RawError::InputClosed);
        }
        self.stage(Progress::LoadRaw, |p| p.load_raw(&layout))
    }

    fn load_raw(&mut self, layout: &Layout) -> Result<()> {
        let sizes = self.meta.sizes;
        let (width, height) = (sizes.raw_width as usize, sizes.raw_height as usize);
        let bps = layout.bytes_per_sample;
        self.limits()
            .check_raw(width as u32, height as u32, size_of::<u16>() as u64)?;

        let mut samples: Vec<u16> = Vec::new();
        if samples.try_reserve_exact(width * height).is_err() {
            return Err(self.out_of_memory(c"unpack()"));
        }
        let stream = self.stream.as_mut().ok_or(RawError::InputClosed)?;
        if stream.seek(layout.data_offset, SEEK_SET) != 0 {
            return Err(RawError::Io(io::Error::other("cannot seek to raw data")));
        }

        let mut line = vec![0u8; width * bps];
        let mut truncated = false;
        for _ in 0..height {
            let got = if truncated {
                0
            } else {
                stream.read(&mut line, bps, width).clamp(0, width as c_int) as usize
            };
            if got < width && !truncated {
                truncated = true;
                let offset = stream.tell();
                log::warn!("raw data truncated at offset {offset}");
                self.callbacks.data_error(stream.name(), offset);
            }
            line[got * bps..].fill(0);
            match (bps, layout.big_endian) {
                (1, _) => samples.extend(line.iter().map(|&b| b as u16)),
                (_, true) => samples.extend(
                    line.chunks_exact(2)
                        .map(|b| u16::from_be_bytes([b[0], b[1]])),
                ),
                (_, false) => samples.extend(
                    line.chunks_exact(2)
                        .map(|b| u16::from_le_bytes([b[0], b[1]])),
                ),
            }
        }

        let (left, top) = (sizes.left_margin as usize, sizes.top_margin as usize);
        let visible_max = samples
            .chunks_exact(width)
            .skip(top)
            .take(sizes.height as usize)
            .flat_map(|row| row[left..left + sizes.width as usize].iter().copied())
            .max()
            .unwrap_or(0);
        self.meta.color.data_maximum = visible_max as c_uint;
        self.raw_color = self.meta.color;
        self.raw = Some(ImgVec::new(samples, width, height));
        self.free_image();
        Ok(())
    }

    /// Read the embedded thumbnail.
    pub fn unpack_thumb(&mut self) -> Result<()> {
        let layout = self.layout("unpack_thumb() before open")?;
        if self.stream.is_none() {
            return Err(RawError::InputClosed);
        }
        let thumb = layout.thumb.ok_or(RawError::NoThumbnail)?;
        self.stage(Progress::ThumbLoad, |p| p.load_thumb(&thumb))
    }

    fn load_thumb(&mut self, thumb: &ThumbLayout) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(RawError::InputClosed)?;
        let (width, height) = (thumb.width as usize, thumb.height as usize);
        let colors = thumb.colors as usize;
        let mut bytes = vec![0u8; width * height * colors];
        if stream.seek(thumb.offset, SEEK_SET) != 0
            || stream.read(&mut bytes, colors, width * height) != (width * height) as c_int
        {
            return Err(RawError::Data {
                offset: stream.tell(),
            });
        }
        let pixels = if colors == 1 {
            bytes.iter().map(|&v| Rgb::new(v, v, v)).collect()
        } else {
            bytes
                .chunks_exact(3)
                .map(|p| Rgb::new(p[0], p[1], p[2]))
                .collect()
        };
        self.thumb = Some(Thumbnail {
            pixels: ImgVec::new(pixels, width, height),
            colors: thumb.colors,
        });
        Ok(())
    }

    /// Compute output sizes without decoding.
    pub fn adjust_sizes_info_only(&mut self) -> Result<()> {
        self.layout("adjust_sizes_info_only() before open")?;
        self.stage(Progress::SizeAdjust, |p| {
            let div = if p.params.half_size != 0 { 2 } else { 1 };
            let sizes = &mut p.meta.sizes;
            sizes.iwidth = sizes.width.div_ceil(div);
            sizes.iheight = sizes.height.div_ceil(div);
            Ok(())
        })
    }

    /// Active decoder name and flags.
    pub fn decoder_info(&self) -> Result<DecoderInfo> {
        let layout = self.layout("get_decoder_info() before open")?;
        let mut flags = DECODER_FLATDATA;
        if layout.bytes_per_sample == 1 {
            flags |= DECODER_8BIT;
        }
        Ok(DecoderInfo {
            decoder_name: layout.decoder.name().as_ptr(),
            decoder_flags: flags,
        })
    }

    pub fn unpack_function_name(&self) -> &'static CStr {
        self.layout
            .map_or(c"Function not set", |layout| layout.decoder.name())
    }

    /// Mosaic color at a visible site; 6 when nothing is identified.
    pub fn color_at(&self, row: c_int, col: c_int) -> c_int {
        let filters = self.meta.idata.filters;
        if filters == 0 {
            return 6;
        }
        let c = cfa::fcol(filters, row as usize, col as usize);
        if c == 3 && self.meta.idata.colors == 3 { 1 } else { c as c_int }
    }

    // --- development ---

    /// Build the working image from the unpacked mosaic.
    pub fn raw2image(&mut self) -> Result<()> {
        if self.raw.is_none() {
            return Err(RawError::OutOfOrder("raw2image() before unpack"));
        }
        self.stage(Progress::Raw2Image, |p| {
            let raw = p.raw.as_ref().ok_or(RawError::OutOfOrder("raw2image() before unpack"))?;
            let s = p.meta.sizes;
            let image = develop::raw_to_image(
                raw,
                p.meta.idata.filters,
                s.left_margin as usize,
                s.top_margin as usize,
                s.width as usize,
                s.height as usize,
                p.params.half_size != 0,
            )?;
            p.meta.sizes.iwidth = image.width() as u16;
            p.meta.sizes.iheight = image.height() as u16;
            p.meta.color = p.raw_color;
            p.image = Some(image);
            p.black_subtracted = false;
            p.histogram = None;
            Ok(())
        })
    }

    /// Drop the working image and anything rendered from it.
    pub fn free_image(&mut self) {
        self.image = None;
        self.histogram = None;
        self.black_subtracted = false;
    }

    /// Subtract the black level from the working image once.
    pub fn subtract_black(&mut self) -> Result<()> {
        let image = self
            .image
            .as_mut()
            .ok_or(RawError::OutOfOrder("subtract_black() before raw2image"))?;
        if self.black_subtracted {
            return Ok(());
        }
        let color = &mut self.meta.color;
        let black = match u32::try_from(self.params.user_black) {
            Ok(user) => user,
            Err(_) => color.black,
        };
        develop::subtract_black(image, black.min(u16::MAX as u32) as u16);
        color.maximum = color.maximum.saturating_sub(black).max(1);
        color.black = 0;
        color.data_maximum = develop::data_maximum(image) as c_uint;
        self.black_subtracted = true;
        Ok(())
    }

    /// Run the full development pipeline.
    pub fn process(&mut self) -> Result<()> {
        if self.raw.is_none() {
            return Err(RawError::OutOfOrder("process() before unpack"));
        }
        let output = match self.params.output_color() {
            Some(c @ (OutputColor::Raw | OutputColor::Srgb | OutputColor::Xyz)) => c,
            _ => return Err(RawError::NotImplemented("output color space")),
        };

        self.raw2image()?;
        self.subtract_black()?;
        self.adjust_maximum();

        let clip = self.stage(Progress::ScaleColors, |p| {
            let image = p.image.as_mut().ok_or(RawError::Unspecified)?;
            Ok(develop::scale_colors(image, &p.meta.color, &p.params))
        })?;

        // Three-color mosaics need no green merge before interpolation.
        self.stage(Progress::PreInterpolate, |_| Ok(()))?;

        if self.params.half_size == 0 {
            let demosaic = self.params.demosaic();
            if !demosaic.is_builtin() {
                log::debug!("{demosaic:?} not available, using bilinear interpolation");
            }
            self.stage(Progress::Interpolate, |p| {
                let image = p.image.as_mut().ok_or(RawError::Unspecified)?;
                develop::bilinear(image, p.meta.idata.filters);
                Ok(())
            })?;
        }

        if let Ok(passes) = u32::try_from(self.params.noise_reduction)
            && passes > 0
        {
            self.stage(Progress::MedianFilter, |p| {
                let image = p.image.as_mut().ok_or(RawError::Unspecified)?;
                develop::median_chroma(image, passes);
                Ok(())
            })?;
        }

        self.stage(Progress::Highlights, |p| {
            let image = p.image.as_mut().ok_or(RawError::Unspecified)?;
            develop::highlights(image, p.params.highlight_mode, clip);
            Ok(())
        })?;

        let histogram = self.stage(Progress::ConvertRgb, |p| {
            let image = p.image.as_mut().ok_or(RawError::Unspecified)?;
            develop::convert(image, output, &p.meta.color.rgb_cam)
        })?;
        self.histogram = Some(histogram);

        // Square pixels only, so there is nothing to resample.
        self.stage(Progress::Stretch, |p| {
            log::trace!("pixel aspect {}", p.meta.sizes.pixel_aspect);
            Ok(())
        })
    }

    fn adjust_maximum(&mut self) {
        let color = &mut self.meta.color;
        if let Ok(saturation) = u32::try_from(self.params.user_saturation)
            && saturation > 0
        {
            color.maximum = saturation;
        }
        let threshold = self.params.adjust_maximum_threshold;
        let real = color.data_maximum as f32;
        if threshold > 0.00001
            && real > 0.0
            && real < color.maximum as f32
            && real > color.maximum as f32 * threshold
        {
            log::debug!("maximum {} adjusted to {}", color.maximum, color.data_maximum);
            color.maximum = color.data_maximum;
        }
    }

    // --- rendering ---

    /// Gamma-corrected RGB samples of the processed image.
    fn render(&self, call: &'static str) -> Result<(Vec<u16>, u16, u16, u16)> {
        let (Some(image), Some(histogram)) = (self.image.as_ref(), self.histogram.as_ref()) else {
            return Err(RawError::OutOfOrder(call));
        };
        let params = &self.params;
        let bits = params.output_bits();
        let (width, height) = (image.width(), image.height());

        let mut white = HISTOGRAM_BINS;
        if params.highlight_mode & !2 == 0 && params.no_auto_bright == 0 {
            white = develop::auto_white(histogram, width * height, params.auto_bright_threshold);
        }
        let bright = if params.brightness > 0.0 {
            params.brightness
        } else {
            1.0
        };
        let imax = ((white << 3) as f32 / bright) as i32;
        let curve = develop::gamma_curve(params.gamma[0], params.gamma[1], imax);

        let mut samples = Vec::new();
        if samples.try_reserve_exact(width * height * 3).is_err() {
            return Err(self.out_of_memory(c"make_mem_image()"));
        }
        for px in image.buf() {
            for &v in &px[..3] {
                let v = curve[v as usize];
                samples.push(if bits == 8 { v >> 8 } else { v });
            }
        }
        Ok((samples, width as u16, height as u16, bits))
    }

    /// Render the processed image for foreign callers.
    pub fn make_mem_image(&self) -> Result<*mut ProcessedImage> {
        let (samples, width, height, bits) = self.render("make_mem_image() before process")?;
        let data = output::pack(&samples, bits, ByteOrder::Native)?;
        ProcessedImage::into_raw(width, height, 3, bits, data)
    }

    /// Copy the unpacked thumbnail for foreign callers.
    pub fn make_mem_thumb(&self) -> Result<*mut ProcessedImage> {
        let thumb = self.unpacked_thumb("make_mem_thumb() before unpack_thumb")?;
        let img = &thumb.pixels;
        ProcessedImage::into_raw(
            img.width() as u16,
            img.height() as u16,
            thumb.colors,
            8,
            thumb_bytes(thumb),
        )
    }

    fn unpacked_thumb(&self, call: &'static str) -> Result<&Thumbnail> {
        let layout = self.layout(call)?;
        match &self.thumb {
            Some(thumb) => Ok(thumb),
            None if layout.thumb.is_none() => Err(RawError::NoThumbnail),
            None => Err(RawError::OutOfOrder(call)),
        }
    }

    /// Write the processed image as PPM, or TIFF when `output_tiff` is set.
    pub fn write_image(&self, path: &Path) -> Result<()> {
        let (samples, width, height, bits) = self.render("write_image() before process")?;
        let mut out = BufWriter::new(File::create(path)?);
        if self.params.output_tiff != 0 {
            let data = output::pack(&samples, bits, ByteOrder::Little)?;
            output::write_tiff(&mut out, width, height, bits, &data)?;
        } else {
            let data = output::pack(&samples, bits, ByteOrder::Big)?;
            output::write_pnm(&mut out, width, height, 3, bits, &data)?;
        }
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    /// Write the unpacked thumbnail as PPM (or PGM when grayscale).
    pub fn write_thumb(&self, path: &Path) -> Result<()> {
        let thumb = self.unpacked_thumb("write_thumb() before unpack_thumb")?;
        let img = &thumb.pixels;
        let mut out = BufWriter::new(File::create(path)?);
        output::write_pnm(
            &mut out,
            img.width() as u16,
            img.height() as u16,
            thumb.colors,
            8,
            &thumb_bytes(thumb),
        )?;
        Ok(())
    }
}

fn thumb_bytes(thumb: &Thumbnail) -> Vec<u8> {
    if thumb.colors == 1 {
        thumb.pixels.buf().iter().map(|p| p.g).collect()
    } else {
        thumb
            .pixels
            .buf()
            .iter()
            .flat_map(|p| [p.r, p.g, p.b])
            .collect()
    }
}

impl core::fmt::Debug for Processor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Processor")
            .field("flags", &self.flags)
            .field("layout", &self.layout)
            .field("has_stream", &self.stream.is_some())
            .field("unpacked", &self.raw.is_some())
            .field("processed", &self.histogram.is_some())
            .field("progress", &self.progress)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{INPUT_CLOSED, NO_THUMBNAIL, OUT_OF_ORDER_CALL};
    use core::ffi::{c_char, c_void};
    use core::ptr;

    /// 4×4 RGGB mosaic, maxval 255, optional gray 2×1 thumbnail.
    fn mosaic(thumb: bool) -> Vec<u8> {
        let mut bytes = b"P5\n# make=Zen\n# black=8\n4 4\n255\n".to_vec();
        bytes.extend((0..16u8).map(|i| 40 + i * 10));
        if thumb {
            bytes.extend_from_slice(b"P5\n2 1\n255\n\x10\x20");
        }
        bytes
    }

    fn open(bytes: &[u8]) -> Processor {
        let mut p = Processor::new(0);
        p.open_buffer(bytes).unwrap();
        p
    }

    #[test]
    fn ordering_is_enforced() {
        let mut p = Processor::new(0);
        assert_eq!(p.unpack().unwrap_err().code(), OUT_OF_ORDER_CALL);
        assert_eq!(p.unpack_function_name(), c"Function not set");
        assert_eq!(p.color_at(0, 0), 6);

        p.open_buffer(&mosaic(false)).unwrap();
        assert_eq!(p.process().unwrap_err().code(), OUT_OF_ORDER_CALL);
        assert_eq!(p.make_mem_image().unwrap_err().code(), OUT_OF_ORDER_CALL);
        assert_eq!(p.unpack_thumb().unwrap_err().code(), NO_THUMBNAIL);
        assert_eq!(p.unpack_function_name(), c"pgm_load_raw()");

        p.recycle_datastream();
        assert_eq!(p.unpack().unwrap_err().code(), INPUT_CLOSED);
    }

    #[test]
    fn unpack_and_process() {
        let mut p = open(&mosaic(false));
        p.unpack().unwrap();
        assert_eq!(p.color().data_maximum, 190);
        p.process().unwrap();
        assert_eq!(p.color().black, 0);
        assert_eq!((p.sizes().iwidth, p.sizes().iheight), (4, 4));

        let image = p.make_mem_image().unwrap();
        let header = unsafe { &*image };
        assert_eq!((header.width, header.height, header.colors, header.bits), (4, 4, 3, 8));
        assert_eq!(header.data_size, 48);
        unsafe { ProcessedImage::free(image) };

        let done = p.progress_flags();
        for stage in [Progress::Open, Progress::LoadRaw, Progress::ConvertRgb] {
            assert_ne!(done & stage.bit(), 0);
        }
    }

    fn rendered(p: &Processor) -> Vec<u8> {
        let image = p.make_mem_image().unwrap();
        let bytes = unsafe { (*image).as_slice() }.to_vec();
        unsafe { ProcessedImage::free(image) };
        bytes
    }

    #[test]
    fn process_is_repeatable() {
        let mut p = open(&mosaic(false));
        p.unpack().unwrap();
        p.process().unwrap();
        let first = rendered(&p);
        let maximum = p.color().maximum;

        p.process().unwrap();
        assert_eq!(p.color().maximum, maximum);
        assert_eq!(rendered(&p), first);
    }

    #[test]
    fn user_saturation_can_be_reset() {
        let mut p = open(&mosaic(false));
        p.unpack().unwrap();
        p.process().unwrap();
        let baseline = rendered(&p);
        let maximum = p.color().maximum;

        p.params_mut().user_saturation = 100;
        p.process().unwrap();
        assert_eq!(p.color().maximum, 100);
        assert_ne!(rendered(&p), baseline);

        p.params_mut().user_saturation = -1;
        p.process().unwrap();
        assert_eq!(p.color().maximum, maximum);
        assert_eq!(rendered(&p), baseline);
    }

    #[test]
    fn every_development_stage_reports() {
        let mut p = open(&mosaic(false));
        p.unpack().unwrap();
        p.process().unwrap();
        let done = p.progress_flags();
        for stage in [
            Progress::Raw2Image,
            Progress::ScaleColors,
            Progress::PreInterpolate,
            Progress::Interpolate,
            Progress::Highlights,
            Progress::ConvertRgb,
            Progress::Stretch,
        ] {
            assert_ne!(done & stage.bit(), 0, "{stage:?}");
        }
    }

    unsafe extern "C" fn record_memory_error(
        data: *mut c_void,
        file: *const c_char,
        location: *const c_char,
    ) {
        let seen = unsafe { &mut *data.cast::<Vec<(String, String)>>() };
        let text =
            |s: *const c_char| unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned();
        seen.push((text(file), text(location)));
    }

    #[test]
    fn allocation_failure_fires_memory_callback() {
        let mut seen: Vec<(String, String)> = Vec::new();
        let mut p = open(&mosaic(false));
        p.callbacks_mut()
            .set_memory_error(Some(record_memory_error), ptr::from_mut(&mut seen).cast());
        let err = p.out_of_memory(c"unpack()");
        assert_eq!(err.code(), crate::error::UNSUFFICIENT_MEMORY);
        assert_eq!(seen, [("buffer".to_owned(), "unpack()".to_owned())]);
    }

    #[test]
    fn half_size_output() {
        let mut p = open(&mosaic(false));
        p.params_mut().half_size = 1;
        p.params_mut().output_bps = 16;
        p.unpack().unwrap();
        p.process().unwrap();
        let image = p.make_mem_image().unwrap();
        let header = unsafe { &*image };
        assert_eq!((header.width, header.height, header.bits), (2, 2, 16));
        assert_eq!(header.data_size, 2 * 2 * 3 * 2);
        unsafe { ProcessedImage::free(image) };
        assert_eq!(p.progress_flags() & Progress::Interpolate.bit(), 0);
    }

    #[test]
    fn unsupported_output_color() {
        let mut p = open(&mosaic(false));
        p.unpack().unwrap();
        p.params_mut().output_color = OutputColor::ProPhoto as c_int;
        assert_eq!(p.process().unwrap_err().code(), crate::error::NOT_IMPLEMENTED);
    }

    #[test]
    fn thumbnail_roundtrip() {
        let mut p = open(&mosaic(true));
        assert_eq!(
            p.make_mem_thumb().unwrap_err().code(),
            OUT_OF_ORDER_CALL
        );
        p.unpack_thumb().unwrap();
        let thumb = p.make_mem_thumb().unwrap();
        let header = unsafe { &*thumb };
        assert_eq!((header.width, header.height, header.colors), (2, 1, 1));
        assert_eq!(unsafe { header.as_slice() }, &[0x10, 0x20]);
        unsafe { ProcessedImage::free(thumb) };
    }

    #[test]
    fn recycle_keeps_params() {
        let mut p = open(&mosaic(false));
        p.params_mut().output_bps = 16;
        p.unpack().unwrap();
        p.recycle();
        assert_eq!(p.params().output_bps, 16);
        assert_eq!(p.sizes().raw_width, 0);
        assert_eq!(p.progress_flags(), 0);
        assert!(p.stream_slot().is_none());
        assert_eq!(p.unpack().unwrap_err().code(), OUT_OF_ORDER_CALL);
    }

    #[test]
    fn failed_open_leaves_no_metadata() {
        let mut p = Processor::new(0);
        let err = p.open_buffer(b"P5\n# make=Half\n4").unwrap_err();
        assert_eq!(err.code(), crate::error::FILE_UNSUPPORTED);
        assert_eq!(p.image_params().make[0], 0);
    }

    #[test]
    fn bayer_dump_decodes() {
        let dump = BayerDump {
            raw_width: 2,
            raw_height: 2,
            bayer_pattern: PATTERN_RGGB,
            procflags: BAYER_BIG_ENDIAN,
            ..BayerDump::default()
        };
        let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00];
        let mut p = Processor::new(0);
        p.open_bayer(&data, &dump).unwrap();
        assert_eq!(p.unpack_function_name(), c"bayer_load_raw()");
        p.unpack().unwrap();
        assert_eq!(p.color().data_maximum, 0x0400);
        assert_eq!(p.color().maximum, 0xffff);
        let info = p.decoder_info().unwrap();
        assert_eq!(info.decoder_flags, DECODER_FLATDATA);
    }

    thread_local! {
        static TRUNCATED_AT: core::cell::Cell<c_int> = const { core::cell::Cell::new(-1) };
    }

    unsafe extern "C" fn on_data_error(_data: *mut c_void, _file: *const c_char, offset: c_int) {
        TRUNCATED_AT.with(|t| t.set(offset));
    }

    #[test]
    fn short_data_fires_callback_and_zero_fills() {
        let mut bytes = mosaic(false);
        bytes.truncate(bytes.len() - 6);
        let mut p = open(&bytes);
        p.callbacks_mut()
            .set_data_error(Some(on_data_error), ptr::null_mut());
        p.unpack().unwrap();
        assert_eq!(TRUNCATED_AT.with(|t| t.get()) as usize, bytes.len());
        let raw = p.raw.as_ref().unwrap();
        assert_eq!(raw.buf()[15], 0);
    }

    #[test]
    fn raw_memory_limit() {
        let mut p = open(&mosaic(false));
        p.params_mut().max_raw_memory_mb = 0;
        p.unpack().unwrap();

        let mut big = b"P5\n1024 600\n255\n".to_vec();
        big.resize(big.len() + 1024 * 600, 0);
        let mut p = Processor::new(0);
        p.params_mut().max_raw_memory_mb = 1;
        // File size is within the budget, the 16-bit raw buffer is not.
        p.open_buffer(&big).unwrap();
        assert_eq!(p.unpack().unwrap_err().code(), crate::error::TOO_BIG);
    }
}
