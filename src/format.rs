//! Raw container detection.
//!
//! The identifier probes the first bytes of every input. Only Netpbm Bayer
//! mosaics decode here; the other containers are recognized so that the
//! `FILE_UNSUPPORTED` report can name what was found.

/// Raw containers recognized by magic bytes.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RawFormat {
    /// Binary PGM carrying a Bayer mosaic.
    NetpbmBayer,
    /// TIFF-based raw (CR2, NEF, ARW, DNG, PEF, ...).
    Tiff,
    /// Canon CR3 (ISO base media).
    Cr3,
    /// Canon CRW (CIFF).
    Crw,
    /// Fujifilm RAF.
    Raf,
    /// Olympus ORF.
    Orf,
    /// Panasonic RW2.
    Rw2,
    /// Sigma X3F.
    X3f,
}

impl RawFormat {
    /// Bytes read from the start of the stream before identification.
    pub const PROBE_BYTES: usize = 16;

    /// Detect format from magic bytes. Returns `None` if unrecognized.
    pub fn detect(data: &[u8]) -> Option<Self> {
        // Binary PGM: "P5" followed by whitespace
        if data.len() >= 3 && data[..2] == *b"P5" && data[2].is_ascii_whitespace() {
            return Some(RawFormat::NetpbmBayer);
        }

        // Fujifilm: "FUJIFILM"
        if data.len() >= 8 && data[..8] == *b"FUJIFILM" {
            return Some(RawFormat::Raf);
        }

        // Olympus: "IIRO" / "IIRS" / "MMOR"
        if data.len() >= 4
            && (data[..4] == *b"IIRO" || data[..4] == *b"IIRS" || data[..4] == *b"MMOR")
        {
            return Some(RawFormat::Orf);
        }

        // Panasonic: "IIU\0"
        if data.len() >= 4 && data[..4] == *b"IIU\0" {
            return Some(RawFormat::Rw2);
        }

        // Canon CRW: "II" + header length + "HEAPCCDR"
        if data.len() >= 14 && data[..2] == *b"II" && data[6..14] == *b"HEAPCCDR" {
            return Some(RawFormat::Crw);
        }

        // TIFF: "II*\0" or "MM\0*"
        if data.len() >= 4 && (data[..4] == *b"II*\0" || data[..4] == *b"MM\0*") {
            return Some(RawFormat::Tiff);
        }

        // CR3: ftyp box with "crx " brand
        if data.len() >= 12 && data[4..8] == *b"ftyp" && data[8..12] == *b"crx " {
            return Some(RawFormat::Cr3);
        }

        // Sigma: "FOVb"
        if data.len() >= 4 && data[..4] == *b"FOVb" {
            return Some(RawFormat::X3f);
        }

        None
    }

    /// Whether the built-in decoders handle this container.
    pub fn is_supported(self) -> bool {
        matches!(self, RawFormat::NetpbmBayer)
    }

    /// Short name used in error reports.
    pub fn name(self) -> &'static str {
        match self {
            RawFormat::NetpbmBayer => "Netpbm Bayer",
            RawFormat::Tiff => "TIFF-based raw",
            RawFormat::Cr3 => "Canon CR3",
            RawFormat::Crw => "Canon CRW",
            RawFormat::Raf => "Fujifilm RAF",
            RawFormat::Orf => "Olympus ORF",
            RawFormat::Rw2 => "Panasonic RW2",
            RawFormat::X3f => "Sigma X3F",
        }
    }
}

impl core::fmt::Display for RawFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_netpbm_bayer() {
        assert_eq!(
            RawFormat::detect(b"P5\n4 4\n255\n"),
            Some(RawFormat::NetpbmBayer)
        );
        assert!(RawFormat::NetpbmBayer.is_supported());
        // Color PPM is not a mosaic.
        assert_eq!(RawFormat::detect(b"P6\n4 4\n255\n"), None);
    }

    #[test]
    fn detect_tiff_both_orders() {
        assert_eq!(RawFormat::detect(b"II*\0\x08\0\0\0"), Some(RawFormat::Tiff));
        assert_eq!(RawFormat::detect(b"MM\0*\0\0\0\x08"), Some(RawFormat::Tiff));
        assert!(!RawFormat::Tiff.is_supported());
    }

    #[test]
    fn detect_vendor_containers() {
        assert_eq!(RawFormat::detect(b"FUJIFILMCCD-RAW "), Some(RawFormat::Raf));
        assert_eq!(RawFormat::detect(b"IIRO\x08\0\0\0"), Some(RawFormat::Orf));
        assert_eq!(RawFormat::detect(b"IIU\0\x08\0\0\0"), Some(RawFormat::Rw2));
        assert_eq!(
            RawFormat::detect(b"II\x1a\0\0\0HEAPCCDR"),
            Some(RawFormat::Crw)
        );
        assert_eq!(
            RawFormat::detect(b"\0\0\0\x18ftypcrx \0\0\0\x01"),
            Some(RawFormat::Cr3)
        );
        assert_eq!(RawFormat::detect(b"FOVb\0\0\0\0"), Some(RawFormat::X3f));
    }

    #[test]
    fn detect_unknown() {
        assert_eq!(RawFormat::detect(b"nope"), None);
        assert_eq!(RawFormat::detect(&[]), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(RawFormat::Cr3.to_string(), "Canon CR3");
        assert_eq!(RawFormat::NetpbmBayer.to_string(), "Netpbm Bayer");
    }
}
