//! Player-experience tracking hierarchy
//!
//! Three scopes, each owning its own accumulators:
//!
//! - [`PlayerComponent`]: one per connection, fed samples at frame or
//!   network-tick rate; publishes frame-time shards every few seconds
//! - [`PlayerTracker`]: one per player, rolls up every connection
//! - [`MatchTracker`]: one per match, owns the player trackers and builds
//!   the [`MatchReport`]
//!
//! Nothing here reads a clock or a socket. Callers push readings and times
//! in, and merging between scopes is plain value combination.
//!
//! # Example
//!
//! ```
//! use rollupstats::tracking::{MatchTracker, TrackerConfig};
//!
//! let mut game = MatchTracker::new("match-42", TrackerConfig::default()).unwrap();
//! game.start(0.0);
//!
//! let player = game.add_player("player-1").connect(0.0);
//! for ping in [0.031, 0.029, 0.044] {
//!     player.record_ping(ping);
//! }
//! game.record_frame_time(8.3);
//!
//! game.end(600.0);
//! let report = game.create_report();
//! assert_eq!(report.players[0].ping_stats.sample_count, 3);
//! println!("{}", report.to_json_pretty().unwrap());
//! ```

mod component;
mod config;
mod matches;
mod player;

pub use component::{ComponentTotals, FrameTimeUpdate, PacketTotals, PlayerComponent};
pub use config::{ConfigError, TrackerConfig};
pub use matches::{MatchReport, MatchTracker, REPORT_SCHEMA_VERSION};
pub use player::{PlayerReport, PlayerTracker};
