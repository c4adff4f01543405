//! Fixed-bin histogram accumulators
//!
//! The building block for latency and frame-time telemetry: a bounded-memory
//! summary of a sample stream that can be snapshotted for a report, encoded
//! for replication, and merged with other shards of the same shape.
//!
//! - [`HistogramShape`]: bin count and covered range, shared by every shard
//!   of one metric
//! - [`StatAccumulator`]: the running summary
//! - [`StatSnapshot`]: derived statistics captured for a report
//!
//! # Example
//!
//! ```
//! use rollupstats::histogram::{HistogramShape, StatAccumulator};
//!
//! let shape = HistogramShape::new(100, 0.0, 500.0);
//! let mut period = StatAccumulator::with_shape(shape);
//! let mut lifetime = StatAccumulator::with_shape(shape);
//!
//! for frame_ms in [16.6, 16.7, 33.4, 16.5] {
//!     period.add_sample(frame_ms);
//! }
//!
//! // publish the period shard and start the next period
//! let bytes = period.encode_sparse().unwrap();
//! lifetime += period.take();
//!
//! let received = StatAccumulator::decode_sparse(shape, &bytes).unwrap();
//! assert_eq!(received, lifetime);
//! assert!(period.is_empty());
//!
//! let report = lifetime.capture_snapshot();
//! assert_eq!(report.sample_count, 4);
//! ```

mod accumulator;
mod shape;
mod snapshot;
pub mod wire;

pub use accumulator::StatAccumulator;
pub use shape::HistogramShape;
pub use snapshot::{StatSnapshot, REPORT_PERCENTILES};
