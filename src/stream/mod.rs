//! The canonical byte-stream interface the engine reads through.
//!
//! Every input backend implements [`DataStream`]: [`FileStream`],
//! [`BufferStream`], and the foreign function-pointer table wrapped by
//! [`ForeignStream`](crate::adapter::ForeignStream). Integer-returning
//! operations use `-1` as their failure sentinel; `gets` reports failure as
//! `None`.
//!
//! ```text
//!             ┌→ FileStream    (path, optional in-memory slurp)
//! DataStream ─┼→ BufferStream  (owned bytes)
//!             └→ ForeignStream (caller's function-pointer table)
//! ```

mod buffer;
mod file;

pub use buffer::BufferStream;
pub use file::FileStream;
pub(crate) use file::open_path;

use core::ffi::{CStr, c_int, c_void};
use core::ptr::NonNull;

pub const SEEK_SET: c_int = 0;
pub const SEEK_CUR: c_int = 1;
pub const SEEK_END: c_int = 2;

/// Destination of a single `scanf_one` conversion.
#[derive(Debug)]
pub enum ScanTarget<'a> {
    /// `%d`
    Int(&'a mut c_int),
    /// `%f`
    Float(&'a mut f32),
}

/// How the engine holds its open stream. A pointer to this slot is what
/// foreign code receives as an opaque stream handle.
pub type StreamSlot = Box<dyn DataStream>;

/// Byte-stream operations the engine needs.
pub trait DataStream {
    /// Whether the underlying resource is usable.
    fn valid(&mut self) -> bool {
        true
    }

    /// Read up to `count` elements of `size` bytes into `dst`. Returns the
    /// number of whole elements read, or `-1`.
    fn read(&mut self, dst: &mut [u8], size: usize, count: usize) -> c_int;

    /// Reposition; `whence` is one of `SEEK_SET`, `SEEK_CUR`, `SEEK_END`.
    /// Returns 0 on success, `-1` on failure.
    fn seek(&mut self, offset: i64, whence: c_int) -> c_int;

    fn tell(&mut self) -> i64;

    fn size(&mut self) -> i64;

    /// Next byte, or `-1` at end of stream.
    fn get_char(&mut self) -> c_int;

    /// Read one line (newline included) into `buf`, NUL-terminated.
    /// Returns the number of bytes stored before the NUL, or `None` when
    /// the stream was already exhausted.
    fn gets(&mut self, buf: &mut [u8]) -> Option<usize> {
        read_line(self, buf)
    }

    /// Skip whitespace and convert one number. Returns 1 on conversion,
    /// 0 when the next token is not a number, `-1` at end of stream.
    fn scanf_one(&mut self, target: ScanTarget<'_>) -> c_int {
        scan_number(self, target)
    }

    /// 1 at end of stream, 0 otherwise, `-1` when unknown.
    fn eof(&mut self) -> c_int;

    /// Handle for legacy decoders that need their own stream object.
    fn legacy_stream(&mut self) -> Option<NonNull<c_void>> {
        None
    }

    /// Name reported to the memory and data error callbacks.
    fn name(&self) -> &CStr;
}

/// Map a C `whence` and offset onto an absolute position within `len`.
pub(crate) fn resolve_seek(offset: i64, whence: c_int, current: u64, len: u64) -> Option<u64> {
    let base = match whence {
        SEEK_SET => 0i64,
        SEEK_CUR => i64::try_from(current).ok()?,
        SEEK_END => i64::try_from(len).ok()?,
        _ => return None,
    };
    let target = base.checked_add(offset)?;
    u64::try_from(target).ok()
}

fn read_line<S: DataStream + ?Sized>(stream: &mut S, buf: &mut [u8]) -> Option<usize> {
    if buf.is_empty() {
        return None;
    }
    let mut n = 0;
    let mut exhausted = false;
    while n + 1 < buf.len() {
        let c = stream.get_char();
        if c < 0 {
            exhausted = true;
            break;
        }
        buf[n] = c as u8;
        n += 1;
        if c == b'\n' as c_int {
            break;
        }
    }
    if n == 0 && exhausted {
        return None;
    }
    buf[n] = 0;
    Some(n)
}

fn scan_number<S: DataStream + ?Sized>(stream: &mut S, target: ScanTarget<'_>) -> c_int {
    let float = matches!(target, ScanTarget::Float(_));
    let mut c = stream.get_char();
    while c >= 0 && (c as u8).is_ascii_whitespace() {
        c = stream.get_char();
    }
    if c < 0 {
        return -1;
    }

    let mut token = String::new();
    while c >= 0 {
        let ch = c as u8 as char;
        let accepted = match ch {
            '0'..='9' => true,
            '+' | '-' => token.is_empty() || (float && token.ends_with(['e', 'E'])),
            '.' => float && !token.contains(['.', 'e', 'E']),
            'e' | 'E' => float && !token.is_empty() && !token.contains(['e', 'E']),
            _ => false,
        };
        if !accepted {
            break;
        }
        token.push(ch);
        c = stream.get_char();
    }
    if c >= 0 {
        stream.seek(-1, SEEK_CUR);
    }

    match target {
        ScanTarget::Int(out) => match token.parse() {
            Ok(v) => {
                *out = v;
                1
            }
            Err(_) => 0,
        },
        ScanTarget::Float(out) => match token.parse() {
            Ok(v) => {
                *out = v;
                1
            }
            Err(_) => 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(text: &[u8]) -> BufferStream {
        BufferStream::new(text.to_vec(), c"test")
    }

    #[test]
    fn scan_ints_and_floats() {
        let mut s = stream(b"  640\n480 -3 2.5e1 x");
        let mut v = 0;
        assert_eq!(s.scanf_one(ScanTarget::Int(&mut v)), 1);
        assert_eq!(v, 640);
        assert_eq!(s.scanf_one(ScanTarget::Int(&mut v)), 1);
        assert_eq!(v, 480);
        assert_eq!(s.scanf_one(ScanTarget::Int(&mut v)), 1);
        assert_eq!(v, -3);
        let mut f = 0.0f32;
        assert_eq!(s.scanf_one(ScanTarget::Float(&mut f)), 1);
        assert_eq!(f, 25.0);
        assert_eq!(s.scanf_one(ScanTarget::Int(&mut v)), 0);
        // The unconverted character is left in the stream.
        assert_eq!(s.get_char(), b'x' as c_int);
        assert_eq!(s.scanf_one(ScanTarget::Int(&mut v)), -1);
    }

    #[test]
    fn scan_stops_before_delimiter() {
        let mut s = stream(b"255\nrest");
        let mut v = 0;
        assert_eq!(s.scanf_one(ScanTarget::Int(&mut v)), 1);
        assert_eq!(s.tell(), 3);
        assert_eq!(s.get_char(), b'\n' as c_int);
    }

    #[test]
    fn gets_lines() {
        let mut s = stream(b"P5\n# make=Test\nend");
        let mut buf = [0u8; 64];
        assert_eq!(s.gets(&mut buf), Some(3));
        assert_eq!(&buf[..4], b"P5\n\0");
        assert_eq!(s.gets(&mut buf), Some(12));
        assert_eq!(&buf[..12], b"# make=Test\n");
        assert_eq!(s.gets(&mut buf), Some(3));
        assert_eq!(s.gets(&mut buf), None);
    }

    #[test]
    fn gets_respects_buffer_size() {
        let mut s = stream(b"abcdef\n");
        let mut buf = [0xffu8; 4];
        assert_eq!(s.gets(&mut buf), Some(3));
        assert_eq!(buf, *b"abc\0");
        assert_eq!(s.get_char(), b'd' as c_int);
    }

    #[test]
    fn resolve_seek_positions() {
        assert_eq!(resolve_seek(4, SEEK_SET, 2, 10), Some(4));
        assert_eq!(resolve_seek(-1, SEEK_CUR, 2, 10), Some(1));
        assert_eq!(resolve_seek(-2, SEEK_END, 0, 10), Some(8));
        assert_eq!(resolve_seek(-3, SEEK_CUR, 2, 10), None);
        assert_eq!(resolve_seek(0, 9, 0, 10), None);
    }
}
