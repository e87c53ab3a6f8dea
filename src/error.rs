//! Error codes shared by the engine and the C boundary.
//!
//! [`RawError`] is what the engine returns internally. Every variant maps to a
//! fixed integer through [`RawError::code()`]; those integers are the only
//! failure signal that crosses into foreign code. Boundary-contract violations
//! (null handles, null required outputs) never reach the engine and are
//! reported as [`EINVAL`].

use core::ffi::{CStr, c_int};

use enough::StopReason;
use thiserror::Error;

use crate::limits::LimitExceeded;

/// Result type alias for engine operations.
pub type Result<T> = core::result::Result<T, RawError>;

/// Returned by entry points given a null handle or a null required pointer.
pub const EINVAL: c_int = 22;

pub const SUCCESS: c_int = 0;
pub const UNSPECIFIED_ERROR: c_int = -1;
pub const FILE_UNSUPPORTED: c_int = -2;
pub const REQUEST_FOR_NONEXISTENT_IMAGE: c_int = -3;
pub const OUT_OF_ORDER_CALL: c_int = -4;
pub const NO_THUMBNAIL: c_int = -5;
pub const UNSUPPORTED_THUMBNAIL: c_int = -6;
pub const INPUT_CLOSED: c_int = -7;
pub const NOT_IMPLEMENTED: c_int = -8;
pub const REQUEST_FOR_NONEXISTENT_THUMBNAIL: c_int = -9;
pub const UNSUFFICIENT_MEMORY: c_int = -100007;
pub const DATA_ERROR: c_int = -100008;
pub const IO_ERROR: c_int = -100009;
pub const CANCELLED_BY_CALLBACK: c_int = -100010;
pub const BAD_CROP: c_int = -100011;
pub const TOO_BIG: c_int = -100012;

/// Engine failure, one variant per stable error code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RawError {
    #[error("unspecified error")]
    Unspecified,

    #[error("unsupported file format: {0}")]
    FileUnsupported(&'static str),

    #[error("request for nonexistent image")]
    NonexistentImage,

    #[error("out of order call: {0}")]
    OutOfOrder(&'static str),

    #[error("no thumbnail found")]
    NoThumbnail,

    #[error("unsupported thumbnail format")]
    UnsupportedThumbnail,

    #[error("no input stream, or input stream closed")]
    InputClosed,

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("request for nonexistent thumbnail")]
    NonexistentThumbnail,

    #[error("out of memory in {0}")]
    OutOfMemory(&'static str),

    #[error("corrupt data at offset {offset}")]
    Data { offset: i64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cancelled by progress callback")]
    Cancelled,

    #[error("bad crop box")]
    BadCrop,

    #[error(transparent)]
    TooBig(#[from] LimitExceeded),
}

impl RawError {
    /// The stable integer reported across the C boundary.
    pub fn code(&self) -> c_int {
        match self {
            RawError::Unspecified => UNSPECIFIED_ERROR,
            RawError::FileUnsupported(_) => FILE_UNSUPPORTED,
            RawError::NonexistentImage => REQUEST_FOR_NONEXISTENT_IMAGE,
            RawError::OutOfOrder(_) => OUT_OF_ORDER_CALL,
            RawError::NoThumbnail => NO_THUMBNAIL,
            RawError::UnsupportedThumbnail => UNSUPPORTED_THUMBNAIL,
            RawError::InputClosed => INPUT_CLOSED,
            RawError::NotImplemented(_) => NOT_IMPLEMENTED,
            RawError::NonexistentThumbnail => REQUEST_FOR_NONEXISTENT_THUMBNAIL,
            RawError::OutOfMemory(_) => UNSUFFICIENT_MEMORY,
            RawError::Data { .. } => DATA_ERROR,
            RawError::Io(_) => IO_ERROR,
            RawError::Cancelled => CANCELLED_BY_CALLBACK,
            RawError::BadCrop => BAD_CROP,
            RawError::TooBig(_) => TOO_BIG,
        }
    }

    /// Fatal errors leave the instance unusable until it is recycled.
    pub fn is_fatal(&self) -> bool {
        is_fatal(self.code())
    }
}

impl From<StopReason> for RawError {
    fn from(_: StopReason) -> Self {
        RawError::Cancelled
    }
}

/// Whether `code` belongs to the fatal range.
pub fn is_fatal(code: c_int) -> bool {
    code < -100000
}

/// Collapse an engine result into the integer convention.
pub(crate) fn status(result: Result<()>) -> c_int {
    match result {
        Ok(()) => SUCCESS,
        Err(err) if err.is_fatal() => {
            log::warn!("engine call failed: {err}");
            err.code()
        }
        Err(err) => {
            log::debug!("engine call failed: {err}");
            err.code()
        }
    }
}

/// Human-readable message for a stable error code.
pub fn strerror(code: c_int) -> &'static CStr {
    match code {
        SUCCESS => c"No error",
        UNSPECIFIED_ERROR => c"Unspecified error",
        FILE_UNSUPPORTED => c"Unsupported file format or not RAW file",
        REQUEST_FOR_NONEXISTENT_IMAGE => c"Request for nonexisting image number",
        OUT_OF_ORDER_CALL => c"Out of order call of processing function",
        NO_THUMBNAIL => c"No thumbnail in file",
        UNSUPPORTED_THUMBNAIL => c"Unsupported thumbnail format",
        INPUT_CLOSED => c"No input stream, or input stream closed",
        NOT_IMPLEMENTED => c"Decoder not implemented for this data format",
        REQUEST_FOR_NONEXISTENT_THUMBNAIL => c"Request for nonexisting thumbnail number",
        UNSUFFICIENT_MEMORY => c"Unsufficient memory",
        DATA_ERROR => c"Corrupted data or unexpected EOF",
        IO_ERROR => c"Input/output error",
        CANCELLED_BY_CALLBACK => c"Cancelled by user callback",
        BAD_CROP => c"Bad crop box",
        TOO_BIG => c"Image too big for processing",
        EINVAL => c"Invalid argument",
        _ => c"Unknown error code",
    }
}
