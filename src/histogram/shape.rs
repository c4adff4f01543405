//! Histogram shape: bin count plus the half-open range the bins cover

use crate::traits::ShapeError;

/// Bin layout shared by every accumulator of one metric
///
/// Two accumulators can only be merged when their shapes are identical, so
/// per-scope accumulators should always be spawned from one template shape.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawShape", into = "RawShape"))]
pub struct HistogramShape {
    bin_count: u32,
    min_range: f64,
    max_range: f64,
}

impl HistogramShape {
    /// Default number of bins for a telemetry metric
    pub const DEFAULT_BIN_COUNT: u32 = 100;
    /// Default lower bound (inclusive)
    pub const DEFAULT_MIN_RANGE: f64 = 0.0;
    /// Default upper bound (exclusive), in milliseconds
    pub const DEFAULT_MAX_RANGE: f64 = 500.0;

    /// Create a shape covering `[min_range, max_range)` with `bin_count` bins
    ///
    /// # Panics
    ///
    /// Panics if `bin_count` is zero, a bound is not finite, or the range is
    /// empty. Use [`try_new`](Self::try_new) for shapes read from config.
    pub fn new(bin_count: u32, min_range: f64, max_range: f64) -> Self {
        match Self::try_new(bin_count, min_range, max_range) {
            Ok(shape) => shape,
            Err(err) => panic!("invalid histogram shape: {}", err),
        }
    }

    /// Fallible constructor
    pub fn try_new(bin_count: u32, min_range: f64, max_range: f64) -> Result<Self, ShapeError> {
        if bin_count == 0 {
            return Err(ShapeError::ZeroBins);
        }
        if !min_range.is_finite() || !max_range.is_finite() {
            return Err(ShapeError::NonFiniteRange {
                min: min_range,
                max: max_range,
            });
        }
        if min_range >= max_range {
            return Err(ShapeError::EmptyRange {
                min: min_range,
                max: max_range,
            });
        }
        Ok(Self {
            bin_count,
            min_range,
            max_range,
        })
    }

    pub fn bin_count(&self) -> u32 {
        self.bin_count
    }

    pub fn min_range(&self) -> f64 {
        self.min_range
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// Width of a single bin
    pub fn bin_width(&self) -> f64 {
        (self.max_range - self.min_range) / self.bin_count.max(1) as f64
    }

    /// Whether `value` falls in `[min_range, max_range)`
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min_range && value < self.max_range
    }

    /// Bin index for an in-range value
    ///
    /// Clamped to the last bin so rounding at the upper edge never indexes
    /// past the histogram.
    #[inline]
    pub(crate) fn bin_index(&self, value: f64) -> usize {
        let raw = crate::math::floor((value - self.min_range) / self.bin_width());
        let last = (self.bin_count - 1) as f64;
        raw.clamp(0.0, last) as usize
    }
}

impl Default for HistogramShape {
    fn default() -> Self {
        Self {
            bin_count: Self::DEFAULT_BIN_COUNT,
            min_range: Self::DEFAULT_MIN_RANGE,
            max_range: Self::DEFAULT_MAX_RANGE,
        }
    }
}

impl core::fmt::Display for HistogramShape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "bins={}, range=[{}, {})",
            self.bin_count, self.min_range, self.max_range
        )
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawShape {
    bin_count: u32,
    min_range: f64,
    max_range: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawShape> for HistogramShape {
    type Error = ShapeError;

    fn try_from(raw: RawShape) -> Result<Self, Self::Error> {
        Self::try_new(raw.bin_count, raw.min_range, raw.max_range)
    }
}

#[cfg(feature = "serde")]
impl From<HistogramShape> for RawShape {
    fn from(shape: HistogramShape) -> Self {
        Self {
            bin_count: shape.bin_count,
            min_range: shape.min_range,
            max_range: shape.max_range,
        }
    }
}
