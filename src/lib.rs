//! Flat C ABI over a stateful camera-raw processing engine.
//!
//! Foreign callers hold an opaque [`ZenRawHandle`] and drive one decoding
//! session through `zenraw_*` functions:
//!
//! - [`capi`] : the `extern "C"` entry points (lifecycle, inputs, pipeline,
//!   callbacks, parameters, introspection)
//! - [`DataStream`] : the engine's stream interface, with file, buffer and
//!   foreign-table backends ([`adapter`] bridges both directions)
//! - [`CallbackRegistry`] : EXIF-parser, memory-error, data-error and
//!   progress hooks
//! - [`ProcessingParams`] : the `repr(C)` parameter block
//! - [`RawError`] : engine failures and their stable integer codes
//! - [`RawLimits`] : resource limits derived from `max_raw_memory_mb`
//!
//! The reference [`Processor`] decodes Netpbm-framed Bayer mosaics and
//! caller-described Bayer dumps.
//!
//! Nothing crosses the boundary as a panic; every entry point catches
//! unwinding and reports `UNSPECIFIED_ERROR` or null instead.

pub mod adapter;
pub mod callbacks;
mod cameras;
mod capabilities;
pub mod capi;
pub mod error;
mod format;
pub mod info;
mod limits;
pub mod output;
pub mod params;
mod processor;
pub mod progress;
pub mod stream;

pub use adapter::{ForeignStream, ZenRawDataStream};
pub use callbacks::CallbackRegistry;
pub use capabilities::{
    CAPS_BAYER_INPUT, CAPS_CUSTOM_STREAMS, CAPS_TIFF_OUTPUT, CAPS_UNICODE_PATHS,
    EngineCapabilities,
};
pub use capi::ZenRawHandle;
pub use error::{RawError, Result};
pub use format::RawFormat;
pub use limits::{LimitExceeded, RawLimits};
pub use output::ProcessedImage;
pub use params::{Demosaic, OutputColor, ProcessingParams};
pub use processor::{
    BAYER_8BIT, BAYER_BIG_ENDIAN, BayerDump, DEFAULT_MAX_BUFFERED, PATTERN_BGGR, PATTERN_GBRG,
    PATTERN_GRBG, PATTERN_RGGB, Processor,
};
pub use progress::Progress;
pub use stream::{BufferStream, DataStream, FileStream, StreamSlot};

/// Supported input names, as listed by `zenraw_camera_list`.
pub fn camera_names() -> &'static [&'static core::ffi::CStr] {
    cameras::names()
}
