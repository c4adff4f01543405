//! Report snapshot of an accumulator's derived statistics

use super::accumulator::StatAccumulator;

/// Percentiles captured into every report, in field order
pub const REPORT_PERCENTILES: [f64; 7] = [25.0, 50.0, 75.0, 90.0, 95.0, 97.0, 99.0];

/// Flat record of derived statistics, ready to embed in a telemetry report
///
/// Computed on demand from an accumulator; never updated incrementally.
/// With `serde`, fields serialize under their snake_case names.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatSnapshot {
    pub minimum: f32,
    pub maximum: f32,
    pub mean: f64,
    pub standard_deviation: f64,
    pub variance: f64,
    pub quantile25: f64,
    pub quantile50: f64,
    pub quantile75: f64,
    pub quantile90: f64,
    pub quantile95: f64,
    pub quantile97: f64,
    pub quantile99: f64,
    pub sample_underflow_count: i32,
    pub sample_overflow_count: i32,
    /// In-range samples
    pub sample_count: i32,
}

impl StatSnapshot {
    /// Compute every report field from the accumulator's current state
    ///
    /// An accumulator that never saw a sample reports 0 for minimum and
    /// maximum rather than its infinite sentinels. Extremes beyond the `f32`
    /// range saturate to `f32::MIN`/`f32::MAX` so the record stays finite.
    pub fn capture(acc: &StatAccumulator) -> Self {
        let [q25, q50, q75, q90, q95, q97, q99] = REPORT_PERCENTILES.map(|p| acc.percentile(p));
        Self {
            minimum: saturating_f32(acc.min().unwrap_or(0.0)),
            maximum: saturating_f32(acc.max().unwrap_or(0.0)),
            mean: acc.mean(),
            standard_deviation: acc.standard_deviation(),
            variance: acc.variance(),
            quantile25: q25,
            quantile50: q50,
            quantile75: q75,
            quantile90: q90,
            quantile95: q95,
            quantile97: q97,
            quantile99: q99,
            sample_underflow_count: saturating_i32(acc.underflow_count()),
            sample_overflow_count: saturating_i32(acc.overflow_count()),
            sample_count: saturating_i32(acc.value_count()),
        }
    }

    /// The seven report quantiles in [`REPORT_PERCENTILES`] order
    pub fn quantiles(&self) -> [f64; 7] {
        [
            self.quantile25,
            self.quantile50,
            self.quantile75,
            self.quantile90,
            self.quantile95,
            self.quantile97,
            self.quantile99,
        ]
    }
}

impl From<&StatAccumulator> for StatSnapshot {
    fn from(acc: &StatAccumulator) -> Self {
        Self::capture(acc)
    }
}

fn saturating_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn saturating_f32(value: f64) -> f32 {
    value.clamp(f32::MIN as f64, f32::MAX as f64) as f32
}
