//! Processing stages reported through the progress callback.

use core::ffi::{CStr, c_int};

/// A pipeline stage.
///
/// Values are single bits so completed stages can be accumulated into a
/// mask; `Start` is zero and never recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Progress {
    Start = 0,
    Open = 1,
    Identify = 1 << 1,
    SizeAdjust = 1 << 2,
    LoadRaw = 1 << 3,
    Raw2Image = 1 << 4,
    ScaleColors = 1 << 9,
    PreInterpolate = 1 << 10,
    Interpolate = 1 << 11,
    MedianFilter = 1 << 13,
    Highlights = 1 << 14,
    ConvertRgb = 1 << 18,
    Stretch = 1 << 19,
    ThumbLoad = 1 << 28,
}

impl Progress {
    const ALL: [Progress; 14] = [
        Progress::Start,
        Progress::Open,
        Progress::Identify,
        Progress::SizeAdjust,
        Progress::LoadRaw,
        Progress::Raw2Image,
        Progress::ScaleColors,
        Progress::PreInterpolate,
        Progress::Interpolate,
        Progress::MedianFilter,
        Progress::Highlights,
        Progress::ConvertRgb,
        Progress::Stretch,
        Progress::ThumbLoad,
    ];

    /// Decode a stage value received from foreign code.
    pub fn from_raw(value: c_int) -> Option<Self> {
        Self::ALL.into_iter().find(|p| *p as c_int == value)
    }

    /// Bit recorded in the processor's progress mask.
    pub fn bit(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static CStr {
        match self {
            Progress::Start => c"Starting",
            Progress::Open => c"Opening file",
            Progress::Identify => c"Reading metadata",
            Progress::SizeAdjust => c"Adjusting size",
            Progress::LoadRaw => c"Reading RAW data",
            Progress::Raw2Image => c"RAW to image",
            Progress::ScaleColors => c"Scaling colors",
            Progress::PreInterpolate => c"Pre-interpolation",
            Progress::Interpolate => c"Interpolation",
            Progress::MedianFilter => c"Median filter",
            Progress::Highlights => c"Highlight recovery",
            Progress::ConvertRgb => c"Converting to RGB",
            Progress::Stretch => c"Stretching image",
            Progress::ThumbLoad => c"Loading thumbnail",
        }
    }
}

/// Name of a raw stage value; unknown values get a generic label.
pub fn strprogress(value: c_int) -> &'static CStr {
    Progress::from_raw(value).map_or(c"Some progress stage", Progress::name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_known_stages() {
        for stage in Progress::ALL {
            assert_eq!(Progress::from_raw(stage as c_int), Some(stage));
        }
    }

    #[test]
    fn names() {
        assert_eq!(strprogress(0), c"Starting");
        assert_eq!(strprogress(1 << 3), c"Reading RAW data");
        assert_eq!(strprogress(1 << 28), c"Loading thumbnail");
        assert_eq!(strprogress(1 << 25), c"Some progress stage");
        assert_eq!(strprogress(-7), c"Some progress stage");
    }

    #[test]
    fn bits_are_distinct() {
        let mut seen = 0u32;
        for stage in Progress::ALL.into_iter().skip(1) {
            assert_eq!(seen & stage.bit(), 0);
            seen |= stage.bit();
        }
    }
}
