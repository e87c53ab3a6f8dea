//! Resource limits applied while opening and unpacking.
//!
//! The C surface exposes a single knob, `max_raw_memory_mb`; [`RawLimits`]
//! turns it into concrete checks on header geometry, input size and the
//! unpacked mosaic. A failed check is a [`LimitExceeded`], reported across
//! the boundary as `TOO_BIG`.

use thiserror::Error;

/// Caps for one decode session. `None` leaves a resource unchecked.
///
/// ```
/// use zenraw::RawLimits;
///
/// let limits = RawLimits::none().with_max_width(4000).with_max_raw_bytes(1 << 20);
/// assert!(limits.check_dimensions(4000, 100).is_ok());
/// assert!(limits.check_raw(1024, 1024, 2).is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct RawLimits {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Bytes the unpacked mosaic may occupy.
    pub max_raw_bytes: Option<u64>,
    /// Bytes the input stream may report as its size.
    pub max_input_bytes: Option<u64>,
}

impl RawLimits {
    pub fn none() -> Self {
        Self::default()
    }

    /// Limits for a `max_raw_memory_mb` setting; 0 means no memory cap.
    ///
    /// Geometry never exceeds 16 bits because the size block cannot hold
    /// more. Inputs are uncompressed, so the input size shares the budget.
    pub fn for_raw_memory_mb(mb: u32) -> Self {
        let sixteen_bit = Self::none()
            .with_max_width(u16::MAX.into())
            .with_max_height(u16::MAX.into());
        match u64::from(mb) * 1024 * 1024 {
            0 => sixteen_bit,
            budget => sixteen_bit
                .with_max_raw_bytes(budget)
                .with_max_input_bytes(budget),
        }
    }

    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn with_max_raw_bytes(mut self, bytes: u64) -> Self {
        self.max_raw_bytes = Some(bytes);
        self
    }

    pub fn with_max_input_bytes(mut self, bytes: u64) -> Self {
        self.max_input_bytes = Some(bytes);
        self
    }

    /// Header geometry, checked before anything is allocated.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), LimitExceeded> {
        exceeds(width, self.max_width)
            .map_err(|(actual, max)| LimitExceeded::Width { actual, max })?;
        exceeds(height, self.max_height)
            .map_err(|(actual, max)| LimitExceeded::Height { actual, max })
    }

    /// Size reported by the input stream.
    pub fn check_file_size(&self, bytes: u64) -> Result<(), LimitExceeded> {
        exceeds(bytes, self.max_input_bytes)
            .map_err(|(actual, max)| LimitExceeded::FileSize { actual, max })
    }

    /// A `width` x `height` mosaic stored at `bytes_per_sample`.
    pub fn check_raw(
        &self,
        width: u32,
        height: u32,
        bytes_per_sample: u64,
    ) -> Result<(), LimitExceeded> {
        self.check_dimensions(width, height)?;
        let bytes = u64::from(width)
            .saturating_mul(u64::from(height))
            .saturating_mul(bytes_per_sample);
        exceeds(bytes, self.max_raw_bytes)
            .map_err(|(actual, max)| LimitExceeded::Memory { actual, max })
    }
}

fn exceeds<T: PartialOrd + Copy>(actual: T, max: Option<T>) -> Result<(), (T, T)> {
    match max {
        Some(max) if actual > max => Err((actual, max)),
        _ => Ok(()),
    }
}

/// Which limit failed, with the offending value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LimitExceeded {
    #[error("raw width {actual} exceeds limit {max}")]
    Width { actual: u32, max: u32 },

    #[error("raw height {actual} exceeds limit {max}")]
    Height { actual: u32, max: u32 },

    #[error("{actual} bytes of raw data exceed limit {max}")]
    Memory { actual: u64, max: u64 },

    #[error("input of {actual} bytes exceeds limit {max}")]
    FileSize { actual: u64, max: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_accepts_anything() {
        let limits = RawLimits::none();
        assert!(limits.check_dimensions(u32::MAX, u32::MAX).is_ok());
        assert!(limits.check_raw(u32::MAX, u32::MAX, 8).is_ok());
        assert!(limits.check_file_size(u64::MAX).is_ok());
    }

    #[test]
    fn memory_setting_maps_to_budget() {
        let limits = RawLimits::for_raw_memory_mb(1);
        assert_eq!(limits.max_raw_bytes, Some(1 << 20));
        assert_eq!(limits.max_input_bytes, Some(1 << 20));
        assert_eq!(limits.max_width, Some(65535));

        let unlimited = RawLimits::for_raw_memory_mb(0);
        assert_eq!(unlimited.max_raw_bytes, None);
        assert_eq!(unlimited.max_height, Some(65535));
    }

    #[test]
    fn geometry_checks() {
        let limits = RawLimits::none().with_max_width(1920).with_max_height(1080);
        assert!(limits.check_dimensions(1920, 1080).is_ok());
        assert_eq!(
            limits.check_dimensions(1921, 10),
            Err(LimitExceeded::Width { actual: 1921, max: 1920 })
        );
        assert_eq!(
            limits.check_dimensions(10, 1081),
            Err(LimitExceeded::Height { actual: 1081, max: 1080 })
        );
    }

    #[test]
    fn raw_budget_is_inclusive() {
        let limits = RawLimits::for_raw_memory_mb(1);
        // 1024 x 512 x 2 bytes is exactly 1 MiB.
        assert!(limits.check_raw(1024, 512, 2).is_ok());
        assert!(matches!(
            limits.check_raw(1024, 513, 2),
            Err(LimitExceeded::Memory { .. })
        ));
    }

    #[test]
    fn input_size() {
        let limits = RawLimits::none().with_max_input_bytes(10);
        assert!(limits.check_file_size(10).is_ok());
        assert_eq!(
            limits.check_file_size(11),
            Err(LimitExceeded::FileSize { actual: 11, max: 10 })
        );
    }

    #[test]
    fn messages() {
        let err = LimitExceeded::Height { actual: 70000, max: 65535 };
        assert_eq!(err.to_string(), "raw height 70000 exceeds limit 65535");
    }
}
