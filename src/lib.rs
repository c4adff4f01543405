//! # Rollupstats
//!
//! Mergeable histogram accumulators for player-experience telemetry.
//!
//! A [`StatAccumulator`] keeps bounded-memory summary statistics of a sample
//! stream (ping, frame time): min/max, mean, variance and interpolated
//! quantiles from a fixed-range histogram. Accumulators of the same shape
//! merge exactly, so shards collected independently on clients and servers
//! roll up into per-player and per-match totals.
//!
//! ## Features
//!
//! - **Histogram accumulator**: O(bins) memory, O(1) per sample
//! - **Exact merges**: counts, moments and bins combine without loss
//! - **Sparse wire format**: compact replication of period shards
//! - **Report snapshots**: flat records ready for a JSON report
//! - **Tracking hierarchy**: player component → player tracker → match tracker
//!
//! ## Quick Start
//!
//! ```rust
//! use rollupstats::prelude::*;
//!
//! let mut ping = StatAccumulator::new(100, 0.0, 500.0);
//! for ms in [31.0, 35.0, 29.0, 140.0] {
//!     ping.add_sample(ms);
//! }
//! let snapshot = ping.capture_snapshot();
//! println!("p50 ~{} ms, p99 ~{} ms", snapshot.quantile50, snapshot.quantile99);
//! ```
//!
//! ## Distributed Rollup
//!
//! ```rust
//! use rollupstats::StatAccumulator;
//! use rollupstats::traits::Sketch;
//!
//! let mut client = StatAccumulator::new(100, 0.0, 500.0);
//! let mut server = StatAccumulator::new(100, 0.0, 500.0);
//!
//! client.add_sample(16.6);
//! server.add_sample(8.2);
//!
//! server.merge(&client).unwrap();
//! assert_eq!(server.total_samples(), 2);
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support
//! - `serde`: Serialization of accumulators, shapes and snapshots
//! - `tracking` (default): Player/match trackers and JSON reports
//! - `full`: Enable everything

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(feature = "std"))]
extern crate alloc;

mod math;

// Core traits always available
pub mod traits;

pub mod histogram;

#[cfg(feature = "tracking")]
#[cfg_attr(docsrs, doc(cfg(feature = "tracking")))]
pub mod tracking;

pub mod prelude {
    pub use crate::traits::*;

    pub use crate::histogram::{HistogramShape, StatAccumulator, StatSnapshot};

    #[cfg(feature = "tracking")]
    pub use crate::tracking::{MatchTracker, PlayerComponent, PlayerTracker, TrackerConfig};
}

pub use histogram::{HistogramShape, StatAccumulator, StatSnapshot};
