#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

/// Netpbm Bayer mosaic with a few metadata comments. Samples ramp so that
/// every channel has distinct values.
pub fn mosaic(width: usize, height: usize) -> Vec<u8> {
    let mut bytes = format!(
        "P5\n# make=Zen\n# model=Fixture\n# iso=100\n# black=4\n# cam_mul=2.0 1.0 1.5\n\
         {width} {height}\n255\n"
    )
    .into_bytes();
    bytes.extend((0..width * height).map(|i| (16 + (i * 7) % 224) as u8));
    bytes
}

/// [`mosaic`] followed by an 8-bit PPM thumbnail.
pub fn mosaic_with_thumbnail(width: usize, height: usize) -> Vec<u8> {
    let mut bytes = mosaic(width, height);
    bytes.extend_from_slice(b"P6\n2 2\n255\n");
    bytes.extend((0..12u8).map(|i| i * 20));
    bytes
}

/// Write `bytes` to a fresh file inside `dir`.
pub fn write_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(bytes).unwrap();
    path
}

/// NUL-terminated copy of a path for the C entry points.
pub fn c_path(path: &std::path::Path) -> std::ffi::CString {
    std::ffi::CString::new(path.to_str().unwrap()).unwrap()
}
