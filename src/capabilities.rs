//! Engine capability descriptors.
//!
//! The engine exposes a static [`EngineCapabilities`] describing optional
//! features compiled into this build. Foreign callers see it as a bitmask
//! through `zenraw_capabilities()`.

/// Custom foreign streams are accepted by `zenraw_open_datastream`.
pub const CAPS_CUSTOM_STREAMS: u32 = 1;
/// Caller-described Bayer dumps are accepted by `zenraw_open_bayer`.
pub const CAPS_BAYER_INPUT: u32 = 1 << 1;
/// `zenraw_write_image` can emit TIFF as well as PPM.
pub const CAPS_TIFF_OUTPUT: u32 = 1 << 2;
/// Wide-character path entry points are available.
pub const CAPS_UNICODE_PATHS: u32 = 1 << 3;

/// Optional features of this build, queried through getters.
///
/// # Example
///
/// ```
/// use zenraw::EngineCapabilities;
///
/// static CAPS: EngineCapabilities = EngineCapabilities::new()
///     .with_custom_streams(true)
///     .with_tiff_output(true);
///
/// assert!(CAPS.custom_streams());
/// assert_eq!(CAPS.bits(), 0b101);
/// ```
#[non_exhaustive]
pub struct EngineCapabilities {
    custom_streams: bool,
    bayer_input: bool,
    tiff_output: bool,
    unicode_paths: bool,
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineCapabilities {
    /// Nothing supported; the starting point for the `with_*` chain.
    pub const fn new() -> Self {
        Self {
            custom_streams: false,
            bayer_input: false,
            tiff_output: false,
            unicode_paths: false,
        }
    }

    /// Capabilities of this build.
    pub fn current() -> &'static Self {
        &CURRENT
    }

    /// Whether foreign stream descriptors can be opened.
    pub const fn custom_streams(&self) -> bool {
        self.custom_streams
    }

    /// Whether raw Bayer dumps can be opened with explicit geometry.
    pub const fn bayer_input(&self) -> bool {
        self.bayer_input
    }

    /// Whether processed images can be written as TIFF.
    pub const fn tiff_output(&self) -> bool {
        self.tiff_output
    }

    /// Whether wide-character paths are accepted.
    pub const fn unicode_paths(&self) -> bool {
        self.unicode_paths
    }

    /// Set custom stream support.
    pub const fn with_custom_streams(mut self, v: bool) -> Self {
        self.custom_streams = v;
        self
    }

    /// Set Bayer dump support.
    pub const fn with_bayer_input(mut self, v: bool) -> Self {
        self.bayer_input = v;
        self
    }

    /// Set TIFF output support.
    pub const fn with_tiff_output(mut self, v: bool) -> Self {
        self.tiff_output = v;
        self
    }

    /// Set wide-character path support.
    pub const fn with_unicode_paths(mut self, v: bool) -> Self {
        self.unicode_paths = v;
        self
    }

    /// Pack into the `CAPS_*` bitmask.
    pub const fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.custom_streams {
            bits |= CAPS_CUSTOM_STREAMS;
        }
        if self.bayer_input {
            bits |= CAPS_BAYER_INPUT;
        }
        if self.tiff_output {
            bits |= CAPS_TIFF_OUTPUT;
        }
        if self.unicode_paths {
            bits |= CAPS_UNICODE_PATHS;
        }
        bits
    }
}

static CURRENT: EngineCapabilities = EngineCapabilities::new()
    .with_custom_streams(true)
    .with_bayer_input(true)
    .with_tiff_output(true)
    .with_unicode_paths(cfg!(windows));

impl core::fmt::Debug for EngineCapabilities {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineCapabilities")
            .field("custom_streams", &self.custom_streams)
            .field("bayer_input", &self.bayer_input)
            .field("tiff_output", &self.tiff_output)
            .field("unicode_paths", &self.unicode_paths)
            .finish()
    }
}
