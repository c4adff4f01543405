//! Core traits and error types
//!
//! Accumulators implement the base [`Sketch`] trait so they can be merged and
//! cleared uniformly by whatever scope owns them; [`QuantileSketch`] adds the
//! rank/quantile queries.

use core::fmt::Debug;

#[cfg(feature = "std")]
use std::{string::String, vec::Vec};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

/// Error during accumulator merge
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Accumulators have different histogram shapes
    #[error("incompatible config: expected {expected}, found {found}")]
    IncompatibleConfig { expected: String, found: String },
}

/// Error while decoding a replication record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Input buffer too short
    #[error("buffer too short: expected {expected}, found {found}")]
    BufferTooShort { expected: usize, found: usize },
    /// Corrupted data
    #[error("corrupted data: {0}")]
    Corrupted(String),
}

/// Error while encoding a replication record
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// Bin indices are written as one byte
    #[error("histogram has {bin_count} bins, at most {max} can be encoded")]
    TooManyBins { bin_count: u32, max: u32 },
    /// Counts are written as `i32`
    #[error("count {count} does not fit the wire format")]
    CountOverflow { count: u32 },
}

/// Invalid histogram shape
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("bin count must be at least 1")]
    ZeroBins,
    #[error("range bounds must be finite, got [{min}, {max})")]
    NonFiniteRange { min: f64, max: f64 },
    #[error("range is empty: min {min} must be below max {max}")]
    EmptyRange { min: f64, max: f64 },
}

/// Core trait for all mergeable accumulators
pub trait Sketch: Clone + Debug {
    /// The type of item this sketch processes
    type Item: ?Sized;

    /// Add an item to the sketch
    fn update(&mut self, item: &Self::Item);

    /// Merge another sketch into this one
    ///
    /// Returns an error if sketches are incompatible
    fn merge(&mut self, other: &Self) -> Result<(), MergeError>;

    /// Reset sketch to empty state
    fn clear(&mut self);

    /// Memory usage in bytes
    fn size_bytes(&self) -> usize;

    /// Number of items processed
    fn count(&self) -> u64;

    /// Check if sketch is empty
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Quantile estimation sketches
pub trait QuantileSketch: Sketch {
    /// The value type being tracked
    type Value: PartialOrd + Clone;

    /// Add a value to the sketch
    fn add(&mut self, value: Self::Value);

    /// Get quantile value at given rank (0.0 to 1.0)
    ///
    /// rank=0.5 returns the median
    fn quantile(&self, rank: f64) -> Option<Self::Value>;

    /// Get rank of a value (0.0 to 1.0)
    fn rank(&self, value: &Self::Value) -> f64;

    /// Get CDF value at given point
    fn cdf(&self, value: &Self::Value) -> f64 {
        self.rank(value)
    }

    /// Get minimum value seen
    fn min(&self) -> Option<Self::Value>;

    /// Get maximum value seen
    fn max(&self) -> Option<Self::Value>;

    /// Get median (50th percentile)
    fn median(&self) -> Option<Self::Value> {
        self.quantile(0.5)
    }

    /// Get multiple quantiles at once
    fn quantiles(&self, ranks: &[f64]) -> Vec<Option<Self::Value>> {
        ranks.iter().map(|&r| self.quantile(r)).collect()
    }
}
