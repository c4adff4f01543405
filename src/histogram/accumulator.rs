//! Fixed-bin histogram accumulator
//!
//! Running summary statistics over an unbounded stream of scalar samples in
//! O(bins) memory: global min/max, first and second moments, and a
//! fixed-range histogram for interpolated quantiles. Accumulators of the same
//! shape merge exactly, so shards collected independently (one per player,
//! one per reporting period) can be rolled up without losing information.

use super::shape::HistogramShape;
use super::snapshot::StatSnapshot;
use crate::math;
use crate::traits::{MergeError, QuantileSketch, Sketch};
use core::ops::{Add, AddAssign};

#[cfg(feature = "std")]
use std::vec::Vec;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

// Helper macro for format! in both std and no_std
macro_rules! fmt {
    ($($arg:tt)*) => {{
        #[cfg(feature = "std")]
        { format!($($arg)*) }
        #[cfg(not(feature = "std"))]
        { alloc::format!($($arg)*) }
    }};
}

/// Streaming histogram accumulator
///
/// Samples in `[min_range, max_range)` land in one of `bin_count` equal-width
/// bins and contribute to the running sum and sum of squares. Samples outside
/// the range are only counted (underflow / overflow), but every sample,
/// in range or not, updates the global minimum and maximum.
///
/// Mean and variance are reconstructed from the moment sums, so merging two
/// accumulators reproduces exactly what one accumulator fed both sample sets
/// would report. Quantiles are interpolated within histogram bins and are
/// precise to one bin width.
///
/// # Example
///
/// ```
/// use rollupstats::StatAccumulator;
///
/// // ping in milliseconds, 100 bins over [0, 500)
/// let mut ping = StatAccumulator::new(100, 0.0, 500.0);
///
/// for ms in [32.0, 41.0, 38.0, 55.0, 620.0] {
///     ping.add_sample(ms);
/// }
///
/// assert_eq!(ping.value_count(), 4);
/// assert_eq!(ping.overflow_count(), 1);
/// assert_eq!(ping.max(), Some(620.0));
/// assert!((ping.mean() - 41.5).abs() < 1e-9);
/// ```
///
/// # Distributed Usage
///
/// ```
/// use rollupstats::StatAccumulator;
///
/// let mut client = StatAccumulator::new(10, 0.0, 100.0);
/// let mut server = StatAccumulator::new(10, 0.0, 100.0);
///
/// client.add_sample(12.0);
/// server.add_sample(80.0);
///
/// // fold the client's shard into the server rollup
/// server += &client;
/// assert_eq!(server.total_samples(), 2);
/// assert!((server.mean() - 46.0).abs() < 1e-9);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "serde_impl::RawAccumulator", into = "serde_impl::RawAccumulator")
)]
pub struct StatAccumulator {
    shape: HistogramShape,
    /// Per-bin counts, always `shape.bin_count()` long
    histogram: Vec<u32>,
    underflow_count: u32,
    overflow_count: u32,
    /// In-range samples only
    value_count: u32,
    sum_x: f64,
    sum_x_squared: f64,
    /// Over all samples; `+inf` until the first sample
    minimum_value: f64,
    /// Over all samples; `-inf` until the first sample
    maximum_value: f64,
}

impl Default for StatAccumulator {
    /// 100 bins over `[0, 500)`
    fn default() -> Self {
        Self::with_shape(HistogramShape::default())
    }
}

impl StatAccumulator {
    /// Create an accumulator with `bin_count` bins over `[min_range, max_range)`
    ///
    /// # Panics
    ///
    /// Panics if `bin_count` is zero or the range is empty or not finite.
    pub fn new(bin_count: u32, min_range: f64, max_range: f64) -> Self {
        Self::with_shape(HistogramShape::new(bin_count, min_range, max_range))
    }

    /// Create an empty accumulator from a template shape
    pub fn with_shape(shape: HistogramShape) -> Self {
        Self {
            shape,
            histogram: vec![0; shape.bin_count() as usize],
            underflow_count: 0,
            overflow_count: 0,
            value_count: 0,
            sum_x: 0.0,
            sum_x_squared: 0.0,
            minimum_value: f64::INFINITY,
            maximum_value: f64::NEG_INFINITY,
        }
    }

    /// Zero every counter and the histogram; the shape is kept
    pub fn reset(&mut self) {
        self.histogram.iter_mut().for_each(|c| *c = 0);
        self.underflow_count = 0;
        self.overflow_count = 0;
        self.value_count = 0;
        self.sum_x = 0.0;
        self.sum_x_squared = 0.0;
        self.minimum_value = f64::INFINITY;
        self.maximum_value = f64::NEG_INFINITY;
    }

    /// Hand out the current state and leave an empty accumulator of the same
    /// shape behind
    ///
    /// Publishing a period's shard this way cannot drop or double count a
    /// sample, since the owner does both halves in one call.
    pub fn take(&mut self) -> Self {
        let empty = Self::with_shape(self.shape);
        core::mem::replace(self, empty)
    }

    /// Add a single sample
    ///
    /// NaN is ignored so it can't poison the moment sums. Infinities are
    /// regular out-of-range samples.
    pub fn add_sample(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }

        if value < self.shape.min_range() {
            self.underflow_count += 1;
        } else if value >= self.shape.max_range() {
            self.overflow_count += 1;
        } else {
            self.value_count += 1;
            self.sum_x += value;
            self.sum_x_squared += value * value;
            self.histogram[self.shape.bin_index(value)] += 1;
        }

        if value < self.minimum_value {
            self.minimum_value = value;
        }
        if value > self.maximum_value {
            self.maximum_value = value;
        }
    }

    pub fn shape(&self) -> HistogramShape {
        self.shape
    }

    pub fn bin_count(&self) -> u32 {
        self.shape.bin_count()
    }

    pub fn min_range(&self) -> f64 {
        self.shape.min_range()
    }

    pub fn max_range(&self) -> f64 {
        self.shape.max_range()
    }

    pub fn bin_width(&self) -> f64 {
        self.shape.bin_width()
    }

    /// Per-bin counts
    pub fn histogram(&self) -> &[u32] {
        &self.histogram
    }

    /// Number of in-range samples
    pub fn value_count(&self) -> u32 {
        self.value_count
    }

    /// Same as [`value_count`](Self::value_count); the name used in reports
    pub fn sample_count(&self) -> u32 {
        self.value_count
    }

    pub fn underflow_count(&self) -> u32 {
        self.underflow_count
    }

    pub fn overflow_count(&self) -> u32 {
        self.overflow_count
    }

    /// In-range, underflow and overflow samples together
    pub fn total_samples(&self) -> u32 {
        self.value_count + self.underflow_count + self.overflow_count
    }

    /// Check if no sample was added since construction or the last reset
    pub fn is_empty(&self) -> bool {
        self.total_samples() == 0
    }

    /// Sum of in-range samples
    pub fn sum_x(&self) -> f64 {
        self.sum_x
    }

    /// Sum of squares of in-range samples
    pub fn sum_x_squared(&self) -> f64 {
        self.sum_x_squared
    }

    /// Smallest sample seen, in range or not
    pub fn min(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.minimum_value)
        }
    }

    /// Largest sample seen, in range or not
    pub fn max(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.maximum_value)
        }
    }

    /// Mean of in-range samples, 0 when there are none
    pub fn mean(&self) -> f64 {
        self.sum_x / self.value_count.max(1) as f64
    }

    /// Population variance of in-range samples
    ///
    /// Clamped at zero; `E[x^2] - mean^2` can go slightly negative through
    /// cancellation.
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        let raw = self.sum_x_squared / self.value_count.max(1) as f64 - mean * mean;
        raw.max(0.0)
    }

    pub fn standard_deviation(&self) -> f64 {
        math::sqrt(self.variance())
    }

    /// Interpolated value below which `percentile` percent of samples fall
    ///
    /// `percentile` is in `[0, 100]` and is clamped to it. Underflow samples
    /// count towards the rank first and collapse to `min_range`; if the walk
    /// runs off the last bin the rest of the mass is overflow and the answer
    /// is `max_range`. Within a bin, samples are assumed uniform.
    pub fn percentile(&self, percentile: f64) -> f64 {
        let percentile = if percentile.is_nan() {
            0.0
        } else {
            percentile.clamp(0.0, 100.0)
        };
        let target = percentile / 100.0 * self.value_count as f64;

        let mut running = self.underflow_count as f64;
        if target < running {
            return self.shape.min_range();
        }

        for (index, &count) in self.histogram.iter().enumerate() {
            let count = count as f64;
            if target <= running + count {
                let fractional_index = index as f64 + (target - running) / count.max(1.0);
                return self.shape.min_range() + self.shape.bin_width() * fractional_index;
            }
            running += count;
        }

        self.shape.max_range()
    }

    /// Median estimate
    pub fn median(&self) -> f64 {
        self.percentile(50.0)
    }

    /// Fraction of the rank mass at or below `value`, the inverse of
    /// [`percentile`](Self::percentile)
    fn rank_of(&self, value: f64) -> f64 {
        if self.value_count == 0 || value.is_nan() {
            return 0.0;
        }
        if value < self.shape.min_range() {
            return 0.0;
        }
        if value >= self.shape.max_range() {
            return 1.0;
        }

        let index = self.shape.bin_index(value);
        let below: u64 = self.histogram[..index].iter().map(|&c| c as u64).sum();
        let bin_start = self.shape.min_range() + self.shape.bin_width() * index as f64;
        let fraction = ((value - bin_start) / self.shape.bin_width()).clamp(0.0, 1.0);

        let rank = self.underflow_count as f64
            + below as f64
            + fraction * self.histogram[index] as f64;
        (rank / self.value_count as f64).clamp(0.0, 1.0)
    }

    /// Materialise the report fields
    pub fn capture_snapshot(&self) -> StatSnapshot {
        StatSnapshot::capture(self)
    }

    /// Like [`capture_snapshot`](Self::capture_snapshot), but `None` when no
    /// sample was ever added, so an empty accumulator can't pass for a run
    /// of zero readings
    pub fn summary(&self) -> Option<StatSnapshot> {
        if self.is_empty() {
            None
        } else {
            Some(self.capture_snapshot())
        }
    }

    /// Combine two accumulators into a new one
    ///
    /// Non-panicking form of `&a + &b`.
    pub fn merged(a: &Self, b: &Self) -> Result<Self, MergeError> {
        let mut out = a.clone();
        out.merge(b)?;
        Ok(out)
    }

    fn check_shape(&self, other: &Self) -> Result<(), MergeError> {
        if self.shape != other.shape {
            log::warn!(
                "refusing to merge accumulators: {} vs {}",
                self.shape,
                other.shape
            );
            return Err(MergeError::IncompatibleConfig {
                expected: fmt!("{}", self.shape),
                found: fmt!("{}", other.shape),
            });
        }
        Ok(())
    }

    /// Rebuild from raw parts, used by the decoders
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        shape: HistogramShape,
        histogram: Vec<u32>,
        underflow_count: u32,
        overflow_count: u32,
        value_count: u32,
        sum_x: f64,
        sum_x_squared: f64,
        minimum_value: f64,
        maximum_value: f64,
    ) -> Self {
        debug_assert_eq!(histogram.len(), shape.bin_count() as usize);
        Self {
            shape,
            histogram,
            underflow_count,
            overflow_count,
            value_count,
            sum_x,
            sum_x_squared,
            minimum_value,
            maximum_value,
        }
    }

    pub(crate) fn minimum_value(&self) -> f64 {
        self.minimum_value
    }

    pub(crate) fn maximum_value(&self) -> f64 {
        self.maximum_value
    }
}

impl Sketch for StatAccumulator {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        self.add_sample(*item);
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        self.check_shape(other)?;

        // an empty side must not drag in its +/-inf min/max sentinels
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            self.clone_from(other);
            return Ok(());
        }

        for (a, b) in self.histogram.iter_mut().zip(other.histogram.iter()) {
            *a += *b;
        }
        self.underflow_count += other.underflow_count;
        self.overflow_count += other.overflow_count;
        self.value_count += other.value_count;
        self.sum_x += other.sum_x;
        self.sum_x_squared += other.sum_x_squared;
        self.minimum_value = self.minimum_value.min(other.minimum_value);
        self.maximum_value = self.maximum_value.max(other.maximum_value);

        Ok(())
    }

    fn clear(&mut self) {
        self.reset();
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>() + self.histogram.capacity() * core::mem::size_of::<u32>()
    }

    fn count(&self) -> u64 {
        self.total_samples() as u64
    }
}

impl QuantileSketch for StatAccumulator {
    type Value = f64;

    fn add(&mut self, value: f64) {
        self.add_sample(value);
    }

    fn quantile(&self, rank: f64) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.percentile(rank * 100.0))
        }
    }

    fn rank(&self, value: &f64) -> f64 {
        self.rank_of(*value)
    }

    fn min(&self) -> Option<f64> {
        StatAccumulator::min(self)
    }

    fn max(&self) -> Option<f64> {
        StatAccumulator::max(self)
    }
}

impl AddAssign<&StatAccumulator> for StatAccumulator {
    /// # Panics
    ///
    /// Panics if the shapes differ. Use [`Sketch::merge`] to get an error
    /// instead.
    fn add_assign(&mut self, rhs: &StatAccumulator) {
        if let Err(err) = self.merge(rhs) {
            panic!("cannot merge accumulators: {}", err);
        }
    }
}

impl AddAssign for StatAccumulator {
    fn add_assign(&mut self, rhs: StatAccumulator) {
        if self.is_empty() && self.shape == rhs.shape {
            *self = rhs;
            return;
        }
        *self += &rhs;
    }
}

impl Add<&StatAccumulator> for &StatAccumulator {
    type Output = StatAccumulator;

    fn add(self, rhs: &StatAccumulator) -> StatAccumulator {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Add for StatAccumulator {
    type Output = StatAccumulator;

    fn add(mut self, rhs: StatAccumulator) -> StatAccumulator {
        self += rhs;
        self
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;

    /// Dense serde form. Min/max are optional so an empty accumulator does
    /// not need to serialize infinities.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub(super) struct RawAccumulator {
        shape: HistogramShape,
        histogram: Vec<u32>,
        underflow_count: u32,
        overflow_count: u32,
        value_count: u32,
        sum_x: f64,
        sum_x_squared: f64,
        minimum: Option<f64>,
        maximum: Option<f64>,
    }

    impl From<StatAccumulator> for RawAccumulator {
        fn from(acc: StatAccumulator) -> Self {
            Self {
                minimum: acc.min(),
                maximum: acc.max(),
                shape: acc.shape,
                histogram: acc.histogram,
                underflow_count: acc.underflow_count,
                overflow_count: acc.overflow_count,
                value_count: acc.value_count,
                sum_x: acc.sum_x,
                sum_x_squared: acc.sum_x_squared,
            }
        }
    }

    impl TryFrom<RawAccumulator> for StatAccumulator {
        type Error = crate::traits::DecodeError;

        fn try_from(raw: RawAccumulator) -> Result<Self, Self::Error> {
            use crate::traits::DecodeError;

            if raw.histogram.len() != raw.shape.bin_count() as usize {
                return Err(DecodeError::Corrupted(fmt!(
                    "histogram has {} bins, shape says {}",
                    raw.histogram.len(),
                    raw.shape.bin_count()
                )));
            }
            let binned: u64 = raw.histogram.iter().map(|&c| c as u64).sum();
            if binned != raw.value_count as u64 {
                return Err(DecodeError::Corrupted(fmt!(
                    "histogram holds {} samples, value count is {}",
                    binned,
                    raw.value_count
                )));
            }

            Ok(StatAccumulator::from_parts(
                raw.shape,
                raw.histogram,
                raw.underflow_count,
                raw.overflow_count,
                raw.value_count,
                raw.sum_x,
                raw.sum_x_squared,
                raw.minimum.unwrap_or(f64::INFINITY),
                raw.maximum.unwrap_or(f64::NEG_INFINITY),
            ))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(shape: HistogramShape, values: impl IntoIterator<Item = f64>) -> StatAccumulator {
        let mut acc = StatAccumulator::with_shape(shape);
        for v in values {
            acc.add_sample(v);
        }
        acc
    }

    // ---- Basic functionality ----

    #[test]
    fn test_empty() {
        let acc = StatAccumulator::new(10, 0.0, 100.0);
        assert!(acc.is_empty());
        assert_eq!(acc.total_samples(), 0);
        assert_eq!(acc.mean(), 0.0);
        assert_eq!(acc.variance(), 0.0);
        assert_eq!(acc.standard_deviation(), 0.0);
        assert_eq!(acc.min(), None);
        assert_eq!(acc.max(), None);
        assert!(acc.summary().is_none());
    }

    #[test]
    fn test_default_shape() {
        let acc = StatAccumulator::default();
        assert_eq!(acc.bin_count(), 100);
        assert_eq!(acc.min_range(), 0.0);
        assert_eq!(acc.max_range(), 500.0);
        assert_eq!(acc.histogram().len(), 100);
    }

    #[test]
    fn test_step_samples() {
        let acc = filled(
            HistogramShape::new(100, 0.0, 500.0),
            (1..=49).map(|i| i as f64 * 10.0),
        );
        assert_eq!(acc.value_count(), 49);
        assert_eq!(acc.underflow_count(), 0);
        assert_eq!(acc.overflow_count(), 0);
        assert!((acc.mean() - 250.0).abs() < 1e-9);
        assert_eq!(acc.min(), Some(10.0));
        assert_eq!(acc.max(), Some(490.0));
    }

    #[test]
    fn test_known_variance() {
        let acc = filled(
            HistogramShape::new(10, 0.0, 10.0),
            [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0],
        );
        assert!((acc.mean() - 5.0).abs() < 1e-12);
        assert!((acc.variance() - 4.0).abs() < 1e-12);
        assert!((acc.standard_deviation() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_bins() {
        let acc = filled(HistogramShape::new(4, 0.0, 40.0), [0.0, 5.0, 10.0, 39.9, 25.0]);
        assert_eq!(acc.histogram(), &[2, 1, 1, 1]);
    }

    // ---- Out of range ----

    #[test]
    fn test_overflow_excluded_from_moments() {
        let mut acc = filled(HistogramShape::new(10, 0.0, 100.0), [10.0, 20.0]);
        let mean_before = acc.mean();
        acc.add_sample(100.0);
        acc.add_sample(600.0);
        assert_eq!(acc.overflow_count(), 2);
        assert_eq!(acc.max(), Some(600.0));
        assert_eq!(acc.mean(), mean_before);
        assert_eq!(acc.total_samples(), 4);
    }

    #[test]
    fn test_underflow_excluded_from_moments() {
        let mut acc = filled(HistogramShape::new(10, 0.0, 100.0), [10.0, 20.0]);
        acc.add_sample(-5.0);
        assert_eq!(acc.underflow_count(), 1);
        assert_eq!(acc.min(), Some(-5.0));
        assert!((acc.mean() - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_only_out_of_range() {
        let acc = filled(HistogramShape::new(10, 0.0, 100.0), [-1.0, 150.0]);
        assert_eq!(acc.value_count(), 0);
        assert_eq!(acc.mean(), 0.0);
        assert_eq!(acc.min(), Some(-1.0));
        assert_eq!(acc.max(), Some(150.0));
    }

    // ---- Edge cases: NaN, Infinity ----

    #[test]
    fn test_nan_ignored() {
        let mut acc = StatAccumulator::new(10, 0.0, 100.0);
        acc.add_sample(1.0);
        acc.add_sample(f64::NAN);
        acc.add_sample(3.0);
        assert_eq!(acc.total_samples(), 2);
        assert!((acc.mean() - 2.0).abs() < 1e-12);
        assert!(!acc.variance().is_nan());
    }

    #[test]
    fn test_infinities_are_out_of_range() {
        let mut acc = StatAccumulator::new(10, 0.0, 100.0);
        acc.add_sample(f64::INFINITY);
        acc.add_sample(f64::NEG_INFINITY);
        acc.add_sample(50.0);
        assert_eq!(acc.overflow_count(), 1);
        assert_eq!(acc.underflow_count(), 1);
        assert_eq!(acc.max(), Some(f64::INFINITY));
        assert_eq!(acc.min(), Some(f64::NEG_INFINITY));
        assert!((acc.mean() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_variance_never_negative() {
        let mut acc = StatAccumulator::new(10, 0.0, 1e9);
        for _ in 0..1000 {
            acc.add_sample(123_456_789.123);
        }
        assert!(acc.variance() >= 0.0);
        assert!(!acc.standard_deviation().is_nan());
    }

    // ---- Quantiles ----

    #[test]
    fn test_percentile_interpolates_within_bin() {
        // 10 samples all in bin 2 of [0, 100) / 10 bins
        let acc = filled(HistogramShape::new(10, 0.0, 100.0), (0..10).map(|_| 25.0));
        assert_eq!(acc.percentile(50.0), 25.0);
        assert_eq!(acc.percentile(100.0), 30.0);
    }

    #[test]
    fn test_percentile_underflow_returns_min_range() {
        let mut acc = filled(HistogramShape::new(10, 0.0, 100.0), [50.0, 60.0]);
        for _ in 0..5 {
            acc.add_sample(-10.0);
        }
        assert_eq!(acc.percentile(25.0), 0.0);
    }

    #[test]
    fn test_percentile_rank_starts_after_underflow() {
        // the target rank is taken over in-range samples only, so heavy
        // underflow pulls every quantile down to the range floor
        let mut acc = filled(HistogramShape::new(10, 0.0, 100.0), [50.0]);
        acc.add_sample(-1.0);
        acc.add_sample(-2.0);
        assert_eq!(acc.value_count(), 1);
        assert_eq!(acc.percentile(100.0), 0.0);

        let mut acc = StatAccumulator::new(10, 0.0, 100.0);
        acc.add_sample(-1.0);
        assert_eq!(acc.percentile(0.0), 0.0);
    }

    #[test]
    fn test_percentile_ignores_overflow_mass() {
        let mut acc = filled(HistogramShape::new(10, 0.0, 100.0), [15.0, 15.0]);
        acc.add_sample(500.0);
        assert_eq!(acc.percentile(100.0), 20.0);
        assert!(acc.percentile(100.0) < acc.max_range());
    }

    #[test]
    fn test_percentile_clamps_input() {
        let acc = filled(HistogramShape::new(10, 0.0, 100.0), (0..100).map(|i| i as f64));
        assert_eq!(acc.percentile(-5.0), acc.percentile(0.0));
        assert_eq!(acc.percentile(250.0), acc.percentile(100.0));
        assert_eq!(acc.percentile(f64::NAN), acc.percentile(0.0));
    }

    #[test]
    fn test_uniform_median() {
        let acc = filled(
            HistogramShape::new(100, 0.0, 500.0),
            (0..1000).map(|i| i as f64 * 0.5),
        );
        let median = acc.median();
        assert!((median - 250.0).abs() <= 5.0, "median={}", median);
    }

    #[test]
    fn test_quantile_sketch_trait() {
        let acc = filled(HistogramShape::new(100, 0.0, 100.0), (0..100).map(|i| i as f64));
        let q = QuantileSketch::quantile(&acc, 0.9).unwrap();
        assert!((q - 90.0).abs() <= 1.0, "q={}", q);
        let r = acc.rank(&q);
        assert!((r - 0.9).abs() < 0.02, "r={}", r);
        assert_eq!(acc.rank(&-1.0), 0.0);
        assert_eq!(acc.rank(&100.0), 1.0);

        let empty = StatAccumulator::new(10, 0.0, 1.0);
        assert!(empty.median().is_finite());
        assert!(QuantileSketch::median(&empty).is_none());
    }

    // ---- Merge ----

    #[test]
    fn test_merge_odds_and_evens() {
        let shape = HistogramShape::new(10, 0.0, 100.0);
        let odds = filled(shape, (1..=100).filter(|i| i % 2 == 1).map(|i| i as f64));
        let evens = filled(shape, (1..=100).filter(|i| i % 2 == 0).map(|i| i as f64));

        let merged = &odds + &evens;
        // 100 lands in overflow for [0, 100)
        let direct = filled(shape, (1..=100).map(|i| i as f64));
        assert_eq!(merged, direct);
    }

    #[test]
    fn test_merge_empty_is_identity() {
        let shape = HistogramShape::new(10, 0.0, 100.0);
        let x = filled(shape, [5.0, 15.0, -3.0, 250.0]);
        let empty = StatAccumulator::with_shape(shape);

        assert_eq!(&x + &empty, x);
        assert_eq!(&empty + &x, x);

        let mut y = empty.clone();
        y += x.clone();
        assert_eq!(y, x);
    }

    #[test]
    fn test_merge_incompatible_shape() {
        let mut a = StatAccumulator::new(10, 0.0, 100.0);
        let b = StatAccumulator::new(20, 0.0, 100.0);
        a.add_sample(1.0);
        let err = a.merge(&b).unwrap_err();
        assert!(matches!(err, MergeError::IncompatibleConfig { .. }));
        assert_eq!(a.total_samples(), 1);
    }

    #[test]
    #[should_panic(expected = "cannot merge accumulators")]
    fn test_add_incompatible_shape_panics() {
        let a = StatAccumulator::new(10, 0.0, 100.0);
        let b = StatAccumulator::new(10, 0.0, 200.0);
        let _ = &a + &b;
    }

    #[test]
    fn test_merged_returns_error() {
        let a = StatAccumulator::new(10, 0.0, 100.0);
        let b = StatAccumulator::new(10, 1.0, 100.0);
        assert!(StatAccumulator::merged(&a, &b).is_err());
        assert!(StatAccumulator::merged(&a, &a).is_ok());
    }

    // ---- Reset / take ----

    #[test]
    fn test_reset() {
        let shape = HistogramShape::new(10, 0.0, 100.0);
        let mut acc = filled(shape, [1.0, 2.0, -4.0, 900.0]);
        acc.reset();
        assert_eq!(acc, StatAccumulator::with_shape(shape));
        assert_eq!(acc.shape(), shape);
    }

    #[test]
    fn test_take_leaves_empty_shard() {
        let shape = HistogramShape::new(10, 0.0, 100.0);
        let mut shard = filled(shape, [1.0, 2.0, 3.0]);
        let published = shard.take();
        assert_eq!(published.total_samples(), 3);
        assert!(shard.is_empty());
        assert_eq!(shard.shape(), shape);
    }

    // ---- Snapshot ----

    #[test]
    fn test_summary_present_once_sampled() {
        let acc = filled(HistogramShape::new(10, 0.0, 100.0), [42.0]);
        let summary = acc.summary().unwrap();
        assert_eq!(summary.sample_count, 1);
        assert_eq!(summary.minimum, 42.0);
    }

    #[test]
    fn test_size_bytes_includes_bins() {
        let small = StatAccumulator::new(10, 0.0, 1.0);
        let large = StatAccumulator::new(1000, 0.0, 1.0);
        assert!(large.size_bytes() > small.size_bytes());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip_json() {
        let acc = filled(HistogramShape::new(10, 0.0, 100.0), [1.0, 55.0, -2.0, 300.0]);
        let json = serde_json::to_string(&acc).unwrap();
        let back: StatAccumulator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, acc);

        let empty = StatAccumulator::new(10, 0.0, 100.0);
        let json = serde_json::to_string(&empty).unwrap();
        let back: StatAccumulator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, empty);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_rejects_wrong_bin_count() {
        let json = r#"{"shape":{"bin_count":3,"min_range":0.0,"max_range":3.0},
            "histogram":[1,0],"underflow_count":0,"overflow_count":0,"value_count":1,
            "sum_x":0.5,"sum_x_squared":0.25,"minimum":0.5,"maximum":0.5}"#;
        assert!(serde_json::from_str::<StatAccumulator>(json).is_err());
    }
}
