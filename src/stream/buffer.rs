use core::ffi::{CStr, c_int};
use std::ffi::CString;

use super::{DataStream, resolve_seek};

/// Stream over an owned byte buffer.
///
/// `zenraw_open_buffer` copies the caller's bytes into one of these, so the
/// caller may free its buffer as soon as the call returns.
pub struct BufferStream {
    data: Vec<u8>,
    pos: usize,
    name: CString,
}

impl BufferStream {
    pub fn new(data: Vec<u8>, name: &CStr) -> Self {
        Self {
            data,
            pos: 0,
            name: name.to_owned(),
        }
    }

    fn remaining(&self) -> &[u8] {
        self.data.get(self.pos..).unwrap_or(&[])
    }
}

impl DataStream for BufferStream {
    fn read(&mut self, dst: &mut [u8], size: usize, count: usize) -> c_int {
        if size == 0 || count == 0 {
            return 0;
        }
        let want = size.saturating_mul(count).min(dst.len());
        let n = want.min(self.remaining().len());
        dst[..n].copy_from_slice(&self.remaining()[..n]);
        self.pos += n;
        c_int::try_from(n / size).unwrap_or(c_int::MAX)
    }

    fn seek(&mut self, offset: i64, whence: c_int) -> c_int {
        // Positions past the end are allowed; reads there return nothing.
        match resolve_seek(offset, whence, self.pos as u64, self.data.len() as u64)
            .and_then(|p| usize::try_from(p).ok())
        {
            Some(pos) => {
                self.pos = pos;
                0
            }
            None => -1,
        }
    }

    fn tell(&mut self) -> i64 {
        self.pos as i64
    }

    fn size(&mut self) -> i64 {
        self.data.len() as i64
    }

    fn get_char(&mut self) -> c_int {
        match self.remaining().first() {
            Some(&b) => {
                self.pos += 1;
                b as c_int
            }
            None => -1,
        }
    }

    fn eof(&mut self) -> c_int {
        (self.pos >= self.data.len()) as c_int
    }

    fn name(&self) -> &CStr {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{SEEK_CUR, SEEK_END, SEEK_SET};

    #[test]
    fn read_counts_whole_elements() {
        let mut s = BufferStream::new(vec![1, 2, 3, 4, 5], c"buf");
        let mut dst = [0u8; 8];
        assert_eq!(s.read(&mut dst, 2, 4), 2);
        assert_eq!(&dst[..5], &[1, 2, 3, 4, 5]);
        assert_eq!(s.eof(), 1);
        assert_eq!(s.read(&mut dst, 1, 1), 0);
    }

    #[test]
    fn seek_and_tell() {
        let mut s = BufferStream::new((0u8..10).collect(), c"buf");
        assert_eq!(s.seek(-3, SEEK_END), 0);
        assert_eq!(s.tell(), 7);
        assert_eq!(s.get_char(), 7);
        assert_eq!(s.seek(-2, SEEK_CUR), 0);
        assert_eq!(s.get_char(), 6);
        assert_eq!(s.seek(-1, SEEK_SET), -1);
        assert_eq!(s.tell(), 7);
        assert_eq!(s.size(), 10);
        assert_eq!(s.eof(), 0);
    }

    #[test]
    fn seek_past_end_reads_nothing() {
        let mut s = BufferStream::new(vec![1, 2], c"buf");
        assert_eq!(s.seek(10, SEEK_SET), 0);
        assert_eq!(s.get_char(), -1);
        assert_eq!(s.eof(), 1);
        let mut dst = [0u8; 2];
        assert_eq!(s.read(&mut dst, 1, 2), 0);
    }
}
