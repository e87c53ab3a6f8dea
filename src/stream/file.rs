use core::ffi::{CStr, c_int};
use std::ffi::CString;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::{BufferStream, DataStream, StreamSlot, resolve_seek};

/// Buffered stream over a file on disk.
pub struct FileStream {
    reader: BufReader<File>,
    len: u64,
    name: CString,
}

impl FileStream {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            len,
            name: path_name(path),
        })
    }

    fn position(&mut self) -> Option<u64> {
        self.reader.stream_position().ok()
    }
}

/// Open `path` for decoding. Files no larger than `max_buffered` bytes are
/// read into memory up front; larger ones are streamed.
pub(crate) fn open_path(path: &Path, max_buffered: u64) -> io::Result<StreamSlot> {
    let len = std::fs::metadata(path)?.len();
    if len <= max_buffered {
        log::trace!("buffering {} ({len} bytes)", path.display());
        let data = std::fs::read(path)?;
        return Ok(Box::new(BufferStream::new(data, &path_name(path))));
    }
    Ok(Box::new(FileStream::open(path)?))
}

fn path_name(path: &Path) -> CString {
    CString::new(path.to_string_lossy().into_owned()).unwrap_or_default()
}

impl DataStream for FileStream {
    fn read(&mut self, dst: &mut [u8], size: usize, count: usize) -> c_int {
        if size == 0 || count == 0 {
            return 0;
        }
        let want = size.saturating_mul(count).min(dst.len());
        let mut filled = 0;
        while filled < want {
            match self.reader.read(&mut dst[filled..want]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("read failed: {e}");
                    if filled == 0 {
                        return -1;
                    }
                    break;
                }
            }
        }
        c_int::try_from(filled / size).unwrap_or(c_int::MAX)
    }

    fn seek(&mut self, offset: i64, whence: c_int) -> c_int {
        let Some(current) = self.position() else {
            return -1;
        };
        let Some(target) = resolve_seek(offset, whence, current, self.len) else {
            return -1;
        };
        // Short relative hops keep the read buffer.
        let moved = match i64::try_from(target).ok().zip(i64::try_from(current).ok()) {
            Some((t, c)) => self.reader.seek_relative(t - c),
            None => self.reader.seek(SeekFrom::Start(target)).map(|_| ()),
        };
        if moved.is_ok() { 0 } else { -1 }
    }

    fn tell(&mut self) -> i64 {
        self.position().and_then(|p| i64::try_from(p).ok()).unwrap_or(-1)
    }

    fn size(&mut self) -> i64 {
        i64::try_from(self.len).unwrap_or(i64::MAX)
    }

    fn get_char(&mut self) -> c_int {
        let mut byte = [0u8; 1];
        match self.reader.read_exact(&mut byte) {
            Ok(()) => byte[0] as c_int,
            Err(_) => -1,
        }
    }

    fn eof(&mut self) -> c_int {
        match self.position() {
            Some(pos) => (pos >= self.len) as c_int,
            None => -1,
        }
    }

    fn name(&self) -> &CStr {
        &self.name
    }
}
